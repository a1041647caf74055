use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

use hybsim::config::EngineConfig;
use hybsim::engine::{SimulationEngine, SimulationRecord};
use hybsim::io::CsvWriter;
use hybsim::objective::score_values;
use hybsim::space::OptimizationConfig;
use hybsim::store::StudyStore;
use hybsim::study::{StudyRegistry, StudyResults};
use hybsim::VERSION;

#[derive(Parser, Debug)]
#[command(name = "hybsim")]
#[command(version)]
#[command(about = "Steady-state hybrid rocket performance model and optimization study driver")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output path for JSON artifacts
    #[arg(short, long, global = true)]
    out: Option<String>,

    /// Directory holding persisted study records
    #[arg(long, global = true, default_value = "optimization_studies")]
    studies_dir: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single performance simulation
    Simulate,
    /// Validate a motor configuration file
    Validate,
    /// Create a study and run its trial budget
    Optimize {
        /// Run exactly one trial and return current results
        #[arg(long)]
        stepped: bool,
        /// Also export the trial history as CSV to this path
        #[arg(long)]
        csv: Option<String>,
    },
    /// Run additional trials on an existing study
    Continue {
        /// Study id to continue
        #[arg(long)]
        study: String,
        /// Number of additional trials
        #[arg(long, default_value = "10")]
        trials: usize,
    },
    /// Report best trials and parameter importance for a study
    Results {
        /// Study id to report
        #[arg(long)]
        study: String,
    },
    /// List known studies, in memory and on disk
    Studies,
    /// Print version information
    Version,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn load_engine_config(cfg_path: &str) -> Result<EngineConfig> {
    let cfg_text = fs::read_to_string(cfg_path)
        .with_context(|| format!("failed to read config: {}", cfg_path))?;
    let cfg: EngineConfig = toml::from_str(&cfg_text)
        .with_context(|| format!("failed to parse config: {}", cfg_path))?;
    cfg.validate()?;
    Ok(cfg)
}

fn load_optimization_config(cfg_path: &str) -> Result<OptimizationConfig> {
    let cfg_text = fs::read_to_string(cfg_path)
        .with_context(|| format!("failed to read config: {}", cfg_path))?;
    let cfg: OptimizationConfig = toml::from_str(&cfg_text)
        .with_context(|| format!("failed to parse config: {}", cfg_path))?;
    cfg.validate()?;
    Ok(cfg)
}

fn write_json<T: Serialize>(value: &T, out_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(out_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(out_path, json)?;
    Ok(())
}

fn report_results(results: &StudyResults) {
    eprintln!(
        "[hybsim] study {}: {} trials recorded",
        results.study_id,
        results.trials_history.len()
    );

    if !results.best_trials.is_empty() {
        eprintln!();
        eprintln!("  Best trials:");
        eprintln!("  {:>6} {:>14} values", "trial", "score");
        eprintln!("  {}", "-".repeat(60));
        for trial in &results.best_trials {
            let trial_score = score_values(&trial.values, &results.config.objectives);
            let values: Vec<String> = trial
                .values
                .iter()
                .map(|(name, value)| format!("{}={:.4}", name, value))
                .collect();
            eprintln!(
                "  {:>6} {:>14.6e} {}",
                trial.trial_id,
                trial_score,
                values.join(" ")
            );
        }
    }

    if !results.parameter_importance.is_empty() {
        let mut entries: Vec<(&String, &f64)> = results.parameter_importance.iter().collect();
        entries.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        eprintln!();
        eprintln!("  Parameter importance:");
        for (name, share) in entries {
            eprintln!("    {:<36} {:.3}", name, share);
        }
    }
}

fn export_history_csv(results: &StudyResults, csv_path: &str) -> Result<()> {
    let param_keys: Vec<String> = results
        .config
        .parameter_ranges
        .iter()
        .filter(|(_, range)| !range.fixed)
        .map(|(key, _)| key.clone())
        .collect();
    let value_keys: Vec<String> = results
        .config
        .objectives
        .iter()
        .map(|objective| objective.name.as_str().to_string())
        .collect();

    let mut w = CsvWriter::create(csv_path, param_keys, value_keys)?;
    w.write_header()?;
    for trial in &results.trials_history {
        let trial_score = score_values(&trial.values, &results.config.objectives);
        w.write_row(trial, trial_score)?;
    }
    w.flush()?;
    Ok(())
}

// ============================================================================
// Run Modes
// ============================================================================

fn run_simulate(cfg_path: &str, out_path: &str) -> Result<()> {
    let cfg = load_engine_config(cfg_path)?;
    let engine = SimulationEngine::new();

    let start = Instant::now();
    let performance = engine.simulate(&cfg)?;
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let record = SimulationRecord::new(&cfg, performance);
    eprintln!(
        "[hybsim] {}: thrust={:.3} kN isp={:.1} s mdot={:.3} kg/s cf={:.4} t_c={:.0} K ({:.1} ms)",
        record.id,
        record.performance.thrust,
        record.performance.specific_impulse,
        record.performance.mass_flow_rate,
        record.performance.thrust_coefficient,
        record.performance.chamber_temperature,
        wall_time_ms
    );

    write_json(&record, out_path)?;
    eprintln!("[hybsim] simulation JSON: {}", out_path);
    Ok(())
}

fn run_validate(cfg_path: &str) -> Result<()> {
    let cfg = load_engine_config(cfg_path)?;

    eprintln!("[hybsim] config valid: {}", cfg_path);
    eprintln!(
        "  operating point: pc={} MPa, O/F={}, expansion={}, feed T={} K",
        cfg.chamber_pressure, cfg.mixture_ratio, cfg.nozzle_expansion_ratio, cfg.propellant_temp
    );
    eprintln!(
        "  grain: L={} mm, OD={} mm, port={} mm, profile={}",
        cfg.grain.length_mm,
        cfg.grain.outer_diameter_mm,
        cfg.grain.initial_port_diameter_mm,
        cfg.grain.port_axial_profile.as_str()
    );
    eprintln!(
        "  chamber: L={} mm, ID={} mm, V={} cc",
        cfg.combustion_chamber.length_mm,
        cfg.combustion_chamber.inner_diameter_mm,
        cfg.combustion_chamber.chamber_volume_cc
    );
    eprintln!(
        "  nozzle: throat={} mm, exit={} mm, L={} mm, contour={}",
        cfg.nozzle.throat_diameter_mm,
        cfg.nozzle.exit_diameter_mm,
        cfg.nozzle.length_mm,
        cfg.nozzle.contour_type.as_str()
    );

    Ok(())
}

fn run_optimize(
    registry: &StudyRegistry,
    cfg_path: &str,
    out: Option<String>,
    stepped: bool,
    csv: Option<String>,
) -> Result<()> {
    let cfg = load_optimization_config(cfg_path)?;
    let n_trials = cfg.n_trials;
    let study_id = registry.create(cfg)?;

    eprintln!(
        "[hybsim] study {} created: budget {} trial(s){}",
        study_id,
        if stepped { 1 } else { n_trials },
        if stepped { " (stepped)" } else { "" }
    );

    let start = Instant::now();
    let results = registry.run(&study_id, stepped)?;
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    eprintln!(
        "[hybsim] optimization complete: {} trials in {:.1} ms",
        results.trials_history.len(),
        wall_time_ms
    );
    report_results(&results);

    let out_path = out.unwrap_or_else(|| format!("results/{}_results.json", study_id));
    write_json(&results, &out_path)?;
    eprintln!("[hybsim] results JSON: {}", out_path);

    if let Some(csv_path) = csv {
        export_history_csv(&results, &csv_path)?;
        eprintln!("[hybsim] trial history CSV: {}", csv_path);
    }

    Ok(())
}

fn run_continue(
    registry: &StudyRegistry,
    study_id: &str,
    trials: usize,
    out: Option<String>,
) -> Result<()> {
    let start = Instant::now();
    let results = registry.continue_study(study_id, trials)?;
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    eprintln!(
        "[hybsim] continuation complete: {} more trial(s) in {:.1} ms",
        trials, wall_time_ms
    );
    report_results(&results);

    let out_path = out.unwrap_or_else(|| format!("results/{}_results.json", study_id));
    write_json(&results, &out_path)?;
    eprintln!("[hybsim] results JSON: {}", out_path);

    Ok(())
}

fn run_results(registry: &StudyRegistry, study_id: &str, out: Option<String>) -> Result<()> {
    let results = registry.results(study_id)?;
    report_results(&results);

    if let Some(out_path) = out {
        write_json(&results, &out_path)?;
        eprintln!("[hybsim] results JSON: {}", out_path);
    }

    Ok(())
}

fn print_version() {
    eprintln!("HYBSIM - Hybrid Rocket Steady-State Performance and Study Driver");
    eprintln!();
    eprintln!("  Version:      {}", VERSION);
    eprintln!("  Platform:     {}", std::env::consts::OS);
    eprintln!("  Architecture: {}", std::env::consts::ARCH);
    eprintln!();
    eprintln!("Performance model:");
    eprintln!("  - N2O / paraffin propellants, r = a*G^n regression");
    eprintln!("  - Equilibrium surrogate fitted against CEA, behind a trait seam");
    eprintln!("  - 50-point axial pressure/temperature/velocity profiles");
    eprintln!();
    eprintln!("Optimization:");
    eprintln!("  - Seeded TPE-style sampler, bit-reproducible per seed");
    eprintln!("  - Weighted-sum scalarization for multi-objective studies");
    eprintln!("  - JSON study persistence with transparent resume and continuation");
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let registry = StudyRegistry::new(StudyStore::new(&args.studies_dir));

    match args.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Simulate => {
            let cfg_path = args.config.context("--config required for simulate")?;
            let out_path = args
                .out
                .unwrap_or_else(|| "results/simulation.json".to_string());
            run_simulate(&cfg_path, &out_path)
        }
        Commands::Validate => {
            let cfg_path = args.config.context("--config required for validate")?;
            run_validate(&cfg_path)
        }
        Commands::Optimize { stepped, csv } => {
            let cfg_path = args.config.context("--config required for optimize")?;
            run_optimize(&registry, &cfg_path, args.out, stepped, csv)
        }
        Commands::Continue { study, trials } => run_continue(&registry, &study, trials, args.out),
        Commands::Results { study } => run_results(&registry, &study, args.out),
        Commands::Studies => {
            let ids = registry.list()?;
            eprintln!(
                "[hybsim] {} studies under {}",
                ids.len(),
                registry.store().dir().display()
            );
            for id in ids {
                println!("{}", id);
            }
            Ok(())
        }
    }
}
