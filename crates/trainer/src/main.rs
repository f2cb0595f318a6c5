//! Training CLI for the hold'em CFR+ solver.

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};

use holdem_solver_core::export::export_strategies;
use holdem_solver_core::solver::{CfrSolver, TrainConfig};
use holdem_solver_core::SolverError;

#[derive(Parser)]
#[command(name = "holdem-solver")]
#[command(about = "Approximate NLHE equilibrium strategies via CFR+ self-play")]
struct Cli {
    /// Target total iterations, including any loaded from a checkpoint
    #[arg(short = 'i', long = "iterations", default_value_t = 10_000)]
    iterations: u64,

    /// Seats at the table (2 or 6)
    #[arg(short = 'n', long = "num_players", default_value_t = 2)]
    num_players: usize,

    /// Starting stack in chips (1 BB = 2 chips)
    #[arg(short = 's', long = "stack", default_value_t = 100)]
    stack: i64,

    /// Per-player ante in chips
    #[arg(short = 'a', long = "ante", default_value_t = 0)]
    ante: i64,

    /// Worker threads; 0 uses hardware concurrency
    #[arg(short = 't', long = "threads", default_value_t = 0)]
    threads: usize,

    /// Write a checkpoint here at intervals and at the end
    #[arg(long = "save")]
    save: Option<PathBuf>,

    /// Iterations between periodic saves; 0 saves at the end only
    #[arg(long = "interval", default_value_t = 0)]
    interval: u64,

    /// Resume from an existing checkpoint
    #[arg(long = "load")]
    load: Option<PathBuf>,

    /// Export final strategies as JSON to this path
    #[arg(long = "json")]
    json: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("logger init");

    if let Err(err) = run(&cli) {
        error!("{err}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cli.num_players != 2 && cli.num_players != 6 {
        return Err(Box::new(SolverError::InvalidConfig(format!(
            "num_players must be 2 or 6, got {}",
            cli.num_players
        ))));
    }

    info!(
        "config: iterations={}, players={}, stack={}, ante={}, threads={}",
        cli.iterations,
        cli.num_players,
        cli.stack,
        cli.ante,
        if cli.threads == 0 {
            "auto".to_owned()
        } else {
            cli.threads.to_string()
        }
    );

    let solver = CfrSolver::new();
    let config = TrainConfig {
        iterations: cli.iterations,
        num_players: cli.num_players,
        initial_stack: cli.stack,
        ante: cli.ante,
        num_threads: cli.threads,
        save_path: cli.save.clone(),
        checkpoint_interval: cli.interval,
        load_path: cli.load.clone(),
        seed: None,
    };
    solver.train(&config)?;

    if let Some(json_path) = &cli.json {
        let export = export_strategies(&solver, cli.num_players, cli.stack, cli.ante)?;
        let writer = BufWriter::new(File::create(json_path)?);
        serde_json::to_writer_pretty(writer, &export)?;
        info!(
            "exported strategies for {} position(s) to {}",
            export.len(),
            json_path.display()
        );
    }

    Ok(())
}
