//! # Runeforge Bootstrap CLI
//!
//! Thin glue over the bootstrap orchestrator: resolves a profile from
//! flags or a named template, runs the bootstrap, and reports the result.
//!
//! Exit codes: 0 success, 1 validation error, 2 generation failure,
//! 130 cancelled.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use runeforge::bootstrap::{
    load_templates, BootstrapConfig, BootstrapOrchestrator, Complexity, GameLength, Genre,
};
use runeforge::error::EngineError;
use runeforge::VERSION;

#[derive(Parser, Debug)]
#[command(name = "runeforge-bootstrap", version = VERSION)]
#[command(about = "Generate a complete playable world from a configuration profile")]
struct Args {
    /// Named bootstrap template to use instead of individual flags
    #[arg(long)]
    template: Option<String>,

    /// List available templates and exit
    #[arg(long)]
    list_templates: bool,

    /// Game length: short, medium, long
    #[arg(long, default_value = "medium")]
    length: String,

    /// Complexity: simple, standard, advanced
    #[arg(long, default_value = "standard")]
    complexity: String,

    /// Genre: classic_fantasy, grimdark, high_magic, low_fantasy
    #[arg(long, default_value = "classic_fantasy")]
    genre: String,

    /// Maximum number of players
    #[arg(long, default_value_t = 4)]
    players: u32,

    /// Starting player level
    #[arg(long, default_value_t = 1)]
    level: u8,

    /// World seed; 0 derives one from the wall clock
    #[arg(long, default_value_t = 0)]
    seed: i64,

    /// Output data directory
    #[arg(long, default_value = "./demo_output")]
    output: PathBuf,

    /// Enable the quick-start scenario stage
    #[arg(long)]
    quick: bool,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,
}

fn exit_code_for(err: &EngineError) -> u8 {
    if err.is_cancellation() {
        return 130;
    }
    match err.root_cause() {
        EngineError::Validation(_) | EngineError::Configuration(_) => 1,
        _ => 2,
    }
}

/// Seed 0 means "pick one now"; this is the only wall-clock input the
/// pipeline ever sees, and it happens before generation starts.
fn derive_seed() -> i64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as i64 + d.as_secs() as i64)
        .unwrap_or(1);
    if nanos == 0 {
        1
    } else {
        nanos
    }
}

async fn run(args: Args) -> Result<(), EngineError> {
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    if args.list_templates {
        let templates = load_templates(&cancel, &args.output).await?;
        for (name, template) in templates {
            println!("{name:24} {}", template.description);
        }
        return Ok(());
    }

    let seed = if args.seed == 0 {
        derive_seed()
    } else {
        args.seed
    };

    let orchestrator = match &args.template {
        Some(name) => {
            BootstrapOrchestrator::from_template(&cancel, name, seed, &args.output).await?
        }
        None => {
            let config = BootstrapConfig {
                game_length: GameLength::parse(&args.length)?,
                complexity: Complexity::parse(&args.complexity)?,
                genre: Genre::parse(&args.genre)?,
                max_players: args.players,
                starting_level: args.level,
                world_seed: seed,
                data_dir: args.output.clone(),
                enable_quick_start: args.quick,
            };
            BootstrapOrchestrator::new(config)?
        }
    };

    info!(seed, output = %args.output.display(), "starting bootstrap");
    let world = orchestrator.run(&cancel).await?;

    let summary = world.summary();
    println!("World generated (seed {}):", summary.seed);
    for (category, count) in summary.counts {
        println!("  {category:14} {count}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            std::env::var("RUNEFORGE_LOG").unwrap_or_else(|_| level.to_string()),
        )
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}
