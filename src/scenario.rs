//! Seeded scenario generation: adverse event windows applied to a
//! materialized parameter set.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{EventConfig, RunConfig};
use crate::params::ParameterSet;

/// Placement attempts per window before the instance is declared too
/// crowded for the requested event menu.
const PLACEMENT_ATTEMPTS: usize = 50;

/// Kind of adverse event injected into a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Grid import and export capacity drop to zero.
    Outage,
    /// Battery charge and discharge capacity drop to zero.
    StorageFailure,
    /// Load is multiplied by a sampled factor.
    LoadSpike,
}

impl EventKind {
    /// Parses a configuration kind name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "outage" => Some(Self::Outage),
            "storage_failure" => Some(Self::StorageFailure),
            "load_spike" => Some(Self::LoadSpike),
            _ => None,
        }
    }

    /// The kind's wire name, used in configuration and CSV export.
    pub fn name(self) -> &'static str {
        match self {
            Self::Outage => "outage",
            Self::StorageFailure => "storage_failure",
            Self::LoadSpike => "load_spike",
        }
    }
}

/// One placed event window. `start..end` is half-open in steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventWindow {
    /// Event kind.
    pub kind: EventKind,
    /// First affected step.
    pub start: usize,
    /// One past the last affected step.
    pub end: usize,
    /// Load multiplication factor for spikes, 0 for capacity events.
    pub magnitude: f64,
}

impl EventWindow {
    /// Whether step `t` falls inside the window.
    pub fn covers(&self, t: usize) -> bool {
        self.start <= t && t < self.end
    }

    fn overlaps(&self, other: &EventWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A generated scenario: the perturbed parameters plus the windows that
/// produced them.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Parameters with every event window applied, materialized to the
    /// horizon.
    pub params: ParameterSet,
    /// Placed windows, in placement order.
    pub windows: Vec<EventWindow>,
    /// Scenario length in steps.
    pub horizon: usize,
}

impl Scenario {
    /// Tag for step `t`: the covering window's event name, or `normal`.
    /// Windows never overlap, so at most one covers any step.
    pub fn tag(&self, t: usize) -> &'static str {
        self.windows
            .iter()
            .find(|w| w.covers(t))
            .map_or("normal", |w| w.kind.name())
    }
}

/// Error raised while generating a scenario.
#[derive(Debug)]
pub struct ScenarioError {
    /// Event kind the error refers to.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scenario error: {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ScenarioError {}

/// Generates a scenario from a base parameter set and the configured
/// event menu, deterministically for a given seed.
///
/// No two windows overlap, across kinds included. Each window is placed
/// by rejection sampling; an instance too short or too crowded for its
/// menu is an error, not a silent drop.
///
/// # Errors
///
/// Returns a `ScenarioError` when a window cannot be placed, a duration
/// range does not fit the horizon, or an event kind is unknown.
pub fn generate(
    base: &ParameterSet,
    config: &RunConfig,
    seed: u64,
) -> Result<Scenario, ScenarioError> {
    let horizon = config.simulation.horizon;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = base.materialized(horizon);
    let mut windows: Vec<EventWindow> = Vec::new();

    for event in &config.events {
        let kind = EventKind::from_name(&event.kind).ok_or_else(|| ScenarioError {
            kind: event.kind.clone(),
            message: "unknown event kind".to_string(),
        })?;
        for _ in 0..event.count {
            let window = place_window(&mut rng, kind, event, horizon, &windows)?;
            apply_window(&mut params, &window, horizon);
            windows.push(window);
        }
    }

    Ok(Scenario {
        params,
        windows,
        horizon,
    })
}

fn place_window(
    rng: &mut StdRng,
    kind: EventKind,
    event: &EventConfig,
    horizon: usize,
    placed: &[EventWindow],
) -> Result<EventWindow, ScenarioError> {
    if event.min_duration > horizon {
        return Err(ScenarioError {
            kind: kind.name().to_string(),
            message: format!(
                "min_duration {} exceeds horizon {horizon}",
                event.min_duration
            ),
        });
    }
    let max_duration = event.max_duration.min(horizon);
    for _ in 0..PLACEMENT_ATTEMPTS {
        let duration = rng.random_range(event.min_duration..=max_duration);
        let start = rng.random_range(0..=horizon - duration);
        let magnitude = if kind == EventKind::LoadSpike {
            rng.random_range(event.spike_min..=event.spike_max)
        } else {
            0.0
        };
        let candidate = EventWindow {
            kind,
            start,
            end: start + duration,
            magnitude,
        };
        let clash = placed.iter().any(|w| w.overlaps(&candidate));
        if !clash {
            return Ok(candidate);
        }
    }
    Err(ScenarioError {
        kind: kind.name().to_string(),
        message: format!("no non-overlapping placement found in {PLACEMENT_ATTEMPTS} attempts"),
    })
}

fn apply_window(params: &mut ParameterSet, window: &EventWindow, horizon: usize) {
    match window.kind {
        EventKind::Outage => {
            zero_range(params, "P_grid_import_max", window, horizon);
            zero_range(params, "P_grid_export_max", window, horizon);
        }
        EventKind::StorageFailure => {
            zero_range(params, "Pch_es_max", window, horizon);
            zero_range(params, "Pdis_es_max", window, horizon);
        }
        EventKind::LoadSpike => {
            scale_range(params, "load", window, horizon);
        }
    }
}

fn zero_range(params: &mut ParameterSet, name: &str, window: &EventWindow, horizon: usize) {
    let mut values: Vec<f64> = (0..horizon).map(|t| params.value(name, t)).collect();
    for value in &mut values[window.start..window.end] {
        *value = 0.0;
    }
    params.insert(name, values);
}

fn scale_range(params: &mut ParameterSet, name: &str, window: &EventWindow, horizon: usize) {
    let mut values: Vec<f64> = (0..horizon).map(|t| params.value(name, t)).collect();
    for value in &mut values[window.start..window.end] {
        *value *= window.magnitude;
    }
    params.insert(name, values);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventConfig;

    fn base(horizon: usize) -> ParameterSet {
        ParameterSet::constant(horizon, &[("load", 20.0)])
    }

    fn config_with(horizon: usize, events: Vec<EventConfig>) -> RunConfig {
        let mut config = RunConfig::baseline();
        config.simulation.horizon = horizon;
        config.events = events;
        config
    }

    #[test]
    fn same_seed_same_scenario() {
        let config = config_with(48, RunConfig::stress().events);
        let a = generate(&base(48), &config, 7).expect("generate");
        let b = generate(&base(48), &config, 7).expect("generate");
        assert_eq!(a.windows, b.windows);
        for t in 0..48 {
            assert_eq!(a.params.value("load", t), b.params.value("load", t));
        }
    }

    #[test]
    fn seed_drives_placement() {
        let config = config_with(48, vec![EventConfig::default()]);
        let starts: Vec<usize> = (0..10)
            .map(|seed| generate(&base(48), &config, seed).expect("generate").windows[0].start)
            .collect();
        // ten seeds over 40+ candidate starts: a constant sequence would
        // mean the seed is ignored
        assert!(starts.iter().any(|s| *s != starts[0]), "{starts:?}");
    }

    #[test]
    fn windows_stay_inside_horizon() {
        let config = config_with(24, RunConfig::stress().events);
        let scenario = generate(&base(24), &config, 3).expect("generate");
        for w in &scenario.windows {
            assert!(w.start < w.end);
            assert!(w.end <= 24);
        }
    }

    #[test]
    fn windows_never_overlap_across_kinds() {
        let menu = ["outage", "storage_failure", "load_spike"]
            .map(|kind| EventConfig {
                kind: kind.to_string(),
                count: 2,
                min_duration: 2,
                max_duration: 4,
                ..EventConfig::default()
            })
            .to_vec();
        let config = config_with(96, menu);
        let scenario = generate(&base(96), &config, 11).expect("generate");
        assert_eq!(scenario.windows.len(), 6);
        for (i, a) in scenario.windows.iter().enumerate() {
            for b in &scenario.windows[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn outage_zeroes_grid_capacity() {
        let config = config_with(24, vec![EventConfig::default()]);
        let scenario = generate(&base(24), &config, 5).expect("generate");
        let w = scenario.windows[0];
        for t in w.start..w.end {
            assert_eq!(scenario.params.value("P_grid_import_max", t), 0.0);
            assert_eq!(scenario.params.value("P_grid_export_max", t), 0.0);
        }
        if w.start > 0 {
            assert_eq!(scenario.params.value("P_grid_import_max", w.start - 1), 100.0);
        }
    }

    #[test]
    fn storage_failure_zeroes_storage_capacity() {
        let config = config_with(
            24,
            vec![EventConfig {
                kind: "storage_failure".to_string(),
                ..EventConfig::default()
            }],
        );
        let scenario = generate(&base(24), &config, 5).expect("generate");
        let w = scenario.windows[0];
        for t in w.start..w.end {
            assert_eq!(scenario.params.value("Pch_es_max", t), 0.0);
            assert_eq!(scenario.params.value("Pdis_es_max", t), 0.0);
        }
    }

    #[test]
    fn load_spike_scales_within_bounds() {
        let config = config_with(
            24,
            vec![EventConfig {
                kind: "load_spike".to_string(),
                spike_min: 2.0,
                spike_max: 3.0,
                ..EventConfig::default()
            }],
        );
        let scenario = generate(&base(24), &config, 9).expect("generate");
        let w = scenario.windows[0];
        assert!(w.magnitude >= 2.0 && w.magnitude <= 3.0);
        for t in w.start..w.end {
            let load = scenario.params.value("load", t);
            assert!((load / 20.0 - w.magnitude).abs() < 1e-9);
        }
    }

    #[test]
    fn impossible_menu_is_an_error() {
        // three 20-step outage windows cannot coexist in 24 steps
        let config = config_with(
            24,
            vec![EventConfig {
                kind: "outage".to_string(),
                count: 3,
                min_duration: 20,
                max_duration: 20,
                ..EventConfig::default()
            }],
        );
        let err = generate(&base(24), &config, 1).expect_err("must fail");
        assert_eq!(err.kind, "outage");
    }

    #[test]
    fn tag_names_active_events() {
        let scenario = Scenario {
            params: ParameterSet::new(),
            windows: vec![
                EventWindow {
                    kind: EventKind::Outage,
                    start: 2,
                    end: 5,
                    magnitude: 0.0,
                },
                EventWindow {
                    kind: EventKind::LoadSpike,
                    start: 5,
                    end: 7,
                    magnitude: 2.0,
                },
            ],
            horizon: 8,
        };
        assert_eq!(scenario.tag(0), "normal");
        assert_eq!(scenario.tag(2), "outage");
        assert_eq!(scenario.tag(4), "normal");
        assert_eq!(scenario.tag(5), "load_spike");
        assert_eq!(scenario.tag(7), "normal");
    }
}
