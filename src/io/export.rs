//! CSV export for scenarios and episode histories.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::params::PARAM_NAMES;
use crate::scenario::Scenario;
use crate::sim::env::StepRecord;

/// Column header for episode history export.
const HISTORY_HEADER: &str = "step,grid_import,grid_export,wind,solar,chp,diesel,\
                              storage_charge,storage_discharge,ev_charge,heat_output,\
                              battery_energy,ev_energy,true_cost,normalized_cost,\
                              penalty_load,penalty_heat,penalty_batt,penalty_ev,reward";

/// Exports a scenario to a CSV file: one row per step, every parameter
/// series in canonical order plus the `scenario` tag column.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_scenario_csv(scenario: &Scenario, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_scenario_csv(scenario, buf)
}

/// Writes a scenario as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_scenario_csv(scenario: &Scenario, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header = vec!["step"];
    header.extend(PARAM_NAMES);
    header.push("scenario");
    wtr.write_record(&header)?;

    for t in 0..scenario.horizon {
        let mut row = Vec::with_capacity(header.len());
        row.push(t.to_string());
        for name in PARAM_NAMES {
            row.push(format!("{:.6}", scenario.params.value(name, t)));
        }
        row.push(scenario.tag(t).to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports an episode history to a CSV file, one row per completed step.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_history_csv(history: &[StepRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_history_csv(history, buf)
}

/// Writes an episode history as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_history_csv(history: &[StepRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HISTORY_HEADER.split(',').map(str::trim))?;

    for r in history {
        let f = &r.state.flows;
        let b = &r.breakdown;
        wtr.write_record(&[
            r.step.to_string(),
            format!("{:.4}", f.grid_import),
            format!("{:.4}", f.grid_export),
            format!("{:.4}", f.wind),
            format!("{:.4}", f.solar),
            format!("{:.4}", f.chp),
            format!("{:.4}", f.diesel),
            format!("{:.4}", f.storage_charge),
            format!("{:.4}", f.storage_discharge),
            format!("{:.4}", f.ev_charge),
            format!("{:.4}", f.heat_output),
            format!("{:.4}", r.state.battery_energy),
            format!("{:.4}", r.state.ev_energy),
            format!("{:.6}", b.true_cost),
            format!("{:.6}", b.normalized_cost),
            format!("{:.6}", b.penalty_load),
            format!("{:.6}", b.penalty_heat),
            format!("{:.6}", b.penalty_batt),
            format!("{:.6}", b.penalty_ev),
            format!("{:.6}", r.reward),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
