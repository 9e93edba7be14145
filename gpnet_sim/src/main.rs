//! gpnet Simulator CLI
//!
//! Run evaluation scenarios against the lock-step network engine.

use clap::Parser;
use gpnet_core::NetworkConfig;
use gpnet_sim::programs::standard_table;
use gpnet_sim::scenarios::ScenarioId;
use gpnet_sim::{
    derive_seeds, entropy_seed, BatchEvaluator, FitnessContext, FitnessProvider,
    LeaderElectionFitness, ReactivenessFitness, RunExport, ScenarioResult, ScenarioRunner,
    SimError,
};
use std::fs::File;
use std::path::Path;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// gpnet network simulation CLI
#[derive(Parser, Debug)]
#[command(name = "gpnet-sim")]
#[command(about = "Run deterministic network simulation scenarios for evolved programs", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from OS entropy)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of nodes
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Scenario to run (ring_election, broadcast_election, silent, pool_exhaustion, program_fault, fixed_delay, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of seeds to evaluate, derived from the master seed
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum ticks per run
    #[arg(short, long, default_value = "200")]
    ticks: u64,

    /// Smallest message delay in ticks
    #[arg(long)]
    min_delay: Option<u64>,

    /// Largest message delay in ticks
    #[arg(long)]
    max_delay: Option<u64>,

    /// Message pool capacity (max pending messages)
    #[arg(long)]
    capacity: Option<usize>,

    /// Network configuration JSON file; flags override its values
    #[arg(long)]
    config: Option<String>,

    /// Parallel simulations in multi-seed mode
    #[arg(long, default_value = "4")]
    parallel: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the run (single scenario, single seed) to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// Loads the base configuration and applies flag overrides.
fn network_config(args: &Args) -> Result<NetworkConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(Path::new(path))?;
            serde_json::from_reader(file)?
        }
        None => NetworkConfig::default().with_nodes(5).with_capacity(256),
    };

    if let Some(nodes) = args.nodes {
        config.node_count = nodes;
    }
    if let Some(min) = args.min_delay {
        config.min_delay = min;
    }
    if let Some(max) = args.max_delay {
        config.max_delay = max;
    }
    if let Some(capacity) = args.capacity {
        config.max_pending_messages = capacity;
    }

    config.validate()?;
    Ok(config)
}

/// Fitness provider matching what a scenario's program is trying to do.
fn fitness_provider(scenario: ScenarioId) -> Box<dyn FitnessProvider> {
    match scenario {
        ScenarioId::RingElection | ScenarioId::BroadcastElection | ScenarioId::FixedDelay => {
            Box::new(LeaderElectionFitness::default())
        }
        _ => Box::new(ReactivenessFitness::default()),
    }
}

fn fitness(result: &ScenarioResult) -> Option<f64> {
    let id = standard_table().node_id_symbol();
    result.run.as_ref().map(|run| {
        fitness_provider(result.scenario).calculate_fitness(&FitnessContext::from_run(run, id))
    })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("gpnet Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: ring_election, broadcast_election, silent, pool_exhaustion, program_fault, fixed_delay, all");
                std::process::exit(1);
            }
        }
    };

    let config = match network_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        let seed = entropy_seed();
        info!("Using random seed {}", seed);
        seed
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(base_seed, config.node_count)
        .with_config(config)
        .with_ticks(args.ticks);

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 || args.seeds > 1 {
            eprintln!("Error: --export only supports a single scenario and a single seed");
            std::process::exit(1);
        }

        let result = runner.run(scenarios[0]);
        let mut export = RunExport::from_scenario(&runner, &result);
        if let Some(score) = fitness(&result) {
            export = export.with_fitness(score);
        }

        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} to {}", scenarios[0].name(), export_path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
        }

        if !result.passed {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        info!("✓ {} (seed={}) PASSED", scenarios[0].name(), base_seed);
        return;
    }

    // Run simulations
    let all_results: Vec<ScenarioResult> = if args.seeds <= 1 {
        scenarios.iter().map(|s| runner.run(*s)).collect()
    } else {
        let seeds = derive_seeds(base_seed, args.seeds);
        let evaluator = BatchEvaluator::new(runner, args.parallel);
        match evaluator.evaluate_seeds(&scenarios, &seeds).await {
            Ok(results) => results,
            Err(e) => {
                error!("Batch evaluation failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.ticks_run(),
                    "messages_sent": r.run.as_ref().map(|run| run.stats.messages_sent),
                    "fitness": fitness(r),
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        for result in &all_results {
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED fitness={:.2}",
                    result.scenario.name(),
                    result.seed,
                    fitness(result).unwrap_or(0.0)
                );
            }
        }

        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
