//! Microgrid dispatch entry point: CLI wiring, scenario generation, a
//! baseline rollout, and optional CSV/LP export.

use std::path::Path;
use std::process;
use std::sync::Arc;

use microgrid_dispatch::config::RunConfig;
use microgrid_dispatch::io::export::{export_history_csv, export_scenario_csv};
use microgrid_dispatch::opt::lp::write_lp;
use microgrid_dispatch::opt::model::DispatchModel;
use microgrid_dispatch::params::ParameterSet;
use microgrid_dispatch::policy::{rollout, BaselinePolicy};
use microgrid_dispatch::scenario;
use microgrid_dispatch::sim::env::MicrogridEnv;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    params_dir: Option<String>,
    scenario_out: Option<String>,
    history_out: Option<String>,
    lp_out: Option<String>,
}

fn print_help() {
    eprintln!("microgrid-dispatch — hybrid microgrid dispatch kernel");
    eprintln!();
    eprintln!("Usage: microgrid-dispatch [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>        Load run configuration from TOML file");
    eprintln!("  --preset <name>        Use a built-in preset (baseline, stress)");
    eprintln!("  --seed <u64>           Override random seed");
    eprintln!("  --params <dir>         Load parameter series from <name>.csv files");
    eprintln!("  --scenario-out <path>  Export the generated scenario to CSV");
    eprintln!("  --history-out <path>   Export the baseline episode history to CSV");
    eprintln!("  --lp-out <path>        Write the solver model in LP format");
    eprintln!("  --help                 Show this help message");
    eprintln!();
    eprintln!("If no --config or --preset is given, the baseline preset is used.");
}

fn require_value(args: &[String], i: usize, flag: &str) -> String {
    if i >= args.len() {
        eprintln!("error: {flag} requires an argument");
        process::exit(1);
    }
    args[i].clone()
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        preset: None,
        seed_override: None,
        params_dir: None,
        scenario_out: None,
        history_out: None,
        lp_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                cli.config_path = Some(require_value(&args, i, "--config"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(require_value(&args, i, "--preset"));
            }
            "--seed" => {
                i += 1;
                let raw = require_value(&args, i, "--seed");
                match raw.parse::<u64>() {
                    Ok(s) => cli.seed_override = Some(s),
                    Err(_) => {
                        eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                        process::exit(1);
                    }
                }
            }
            "--params" => {
                i += 1;
                cli.params_dir = Some(require_value(&args, i, "--params"));
            }
            "--scenario-out" => {
                i += 1;
                cli.scenario_out = Some(require_value(&args, i, "--scenario-out"));
            }
            "--history-out" => {
                i += 1;
                cli.history_out = Some(require_value(&args, i, "--history-out"));
            }
            "--lp-out" => {
                i += 1;
                cli.lp_out = Some(require_value(&args, i, "--lp-out"));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Synthetic instance used when no parameter directory is given: a flat
/// load with heat demand and an EV session over the whole horizon.
fn demo_params(horizon: usize) -> ParameterSet {
    ParameterSet::constant(
        horizon,
        &[
            ("load", 60.0),
            ("price_import", 0.25),
            ("price_export", 0.08),
            ("price_ev", 0.30),
            ("rho_gas", 0.12),
            ("rho_fuel", 0.45),
            ("Cop_ma_wt", 0.01),
            ("Cop_ma_pv", 0.01),
            ("C_startup", 2.0),
            ("C_degrad_es", 0.02),
            ("H_demand", 12.0),
            ("Eev_required", 40.0),
            ("A", 1.0),
        ],
    )
}

fn main() {
    let cli = parse_args();

    // Load config: --config takes priority, then --preset, then baseline
    let mut config = if let Some(ref path) = cli.config_path {
        match RunConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match RunConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        RunConfig::baseline()
    };

    if let Some(seed) = cli.seed_override {
        config.simulation.seed = seed;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let horizon = config.simulation.horizon;
    let base = if let Some(ref dir) = cli.params_dir {
        match ParameterSet::from_csv_dir(Path::new(dir), horizon) {
            Ok(set) => set,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        demo_params(horizon)
    };

    let generated = match scenario::generate(&base, &config, config.simulation.seed) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Some(ref path) = cli.scenario_out {
        if let Err(e) = export_scenario_csv(&generated, Path::new(path)) {
            eprintln!("error: failed to write scenario CSV: {e}");
            process::exit(1);
        }
        eprintln!("Scenario written to {path}");
    }

    if let Some(ref path) = cli.lp_out {
        let model = match DispatchModel::build(&generated.params, &config) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        };
        let file = match std::fs::File::create(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("error: cannot create \"{path}\": {e}");
                process::exit(1);
            }
        };
        let mut buf = std::io::BufWriter::new(file);
        if let Err(e) = write_lp(&model, &mut buf) {
            eprintln!("error: failed to write LP file: {e}");
            process::exit(1);
        }
        eprintln!("Model written to {path}");
    }

    let params = Arc::new(generated.params.clone());
    let mut env = match MicrogridEnv::new(config, params) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let total = match rollout(&mut env, &mut BaselinePolicy) {
        Ok(total) => total,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    for record in env.history() {
        println!("t={:>3} [{}] | {}", record.step, generated.tag(record.step), record.state);
    }
    println!();
    println!("episode: {horizon} steps, total reward {total:.4}");

    if let Some(ref path) = cli.history_out {
        if let Err(e) = export_history_csv(env.history(), Path::new(path)) {
            eprintln!("error: failed to write history CSV: {e}");
            process::exit(1);
        }
        eprintln!("History written to {path}");
    }
}
