mod cmd;
mod output;
mod source;

use clap::{Parser, Subcommand};
use sitekeeper_core::error::exit_code;
use sitekeeper_core::ProvisionError;
use source::Source;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sitekeeper",
    about = "Idempotent tenant site provisioning: probe, decide, execute, hand off",
    version,
    propagate_version = true
)]
struct Cli {
    /// KEY=VALUE configuration file; process environment overrides it
    #[arg(long, global = true, env = "SITEKEEPER_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Bench directory (overrides BENCH_DIR)
    #[arg(long, global = true, env = "SITEKEEPER_BENCH_DIR")]
    bench_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one provisioning pass, then optionally exec the application process
    Reconcile {
        /// Probe and decide only; change nothing
        #[arg(long)]
        dry_run: bool,

        /// Command to exec after a successful pass (after `--`)
        #[arg(last = true)]
        then: Vec<String>,
    },

    /// Show the probed bench, site config and schema state
    Probe,

    /// Show the action a reconcile would take
    Plan,

    /// Validate the configuration without probing anything
    Validate,

    /// Render a deployment secret payload as an env file
    RenderEnv {
        /// JSON payload file, or `-` for stdin
        #[arg(long)]
        secret: PathBuf,

        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Reconcile { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let source = Source {
        env_file: cli.env_file,
        bench_dir: cli.bench_dir,
    };

    let result = match cli.command {
        Commands::Reconcile { dry_run, then } => {
            cmd::reconcile::run(&source, dry_run, &then, cli.json)
        }
        Commands::Probe => cmd::probe::run(&source, cli.json),
        Commands::Plan => cmd::plan::run(&source, cli.json),
        Commands::Validate => cmd::validate::run(&source, cli.json),
        Commands::RenderEnv { secret, out } => cmd::render_env::run(&secret, out.as_deref()),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<ProvisionError>())
        .map(ProvisionError::exit_code)
        .unwrap_or(exit_code::OTHER)
}
