//! matrix_diff - differential test loop
//!
//! ```text
//! ┌───────────┐  same bytes  ┌─────────────┐
//! │ Generator │─────┬───────▶│  reference  │──┐
//! │ (seeded)  │     │        └─────────────┘  │   ┌─────────┐
//! └───────────┘     │        ┌─────────────┐  ├──▶│ compare │──▶ "." or report + halt
//!                   └───────▶│  candidate  │──┘   └─────────┘
//!                            └─────────────┘
//! ```

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use matrix_diff::config::{AppConfig, ConfigSource};
use matrix_diff::driver::{HaltReason, Session, SessionState, replay_listing};
use matrix_diff::executor::ExecutableSpec;
use matrix_diff::generator::{ProblemInstance, ShapePolicy};
use matrix_diff::logging;
use matrix_diff::report::{Replay, render_outcome, write_artifacts};

#[derive(Parser)]
#[command(name = "matrix_diff")]
#[command(about = "Differential tester for matrix-operation executables", version)]
struct Cli {
    /// Config environment: loads config/<env>.yaml
    #[arg(short, long, default_value = ConfigSource::DEFAULT_ENV, global = true)]
    env: String,

    /// Explicit config file (overrides --env)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compare the two executables round after round (default)
    Run(RunArgs),
    /// Print generated instances; `--seed` replays a reported round
    Generate {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 1)]
        count: u64,
        #[arg(long, value_enum)]
        shape_policy: Option<ShapePolicy>,
    },
    /// Validate an instance file against the wire grammar ("-" for stdin)
    Check { path: String },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Reference executable
    #[arg(long)]
    reference: Option<String>,
    /// Candidate executable
    #[arg(long)]
    candidate: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_rounds: Option<u64>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long, value_enum)]
    shape_policy: Option<ShapePolicy>,
    /// Directory for finding artifacts
    #[arg(long)]
    artifact_dir: Option<String>,
}

fn apply_overrides(config: &mut AppConfig, args: RunArgs) -> Result<()> {
    let h = &mut config.harness;
    if let Some(p) = args.reference {
        h.reference = ExecutableSpec::new(p);
    }
    if let Some(p) = args.candidate {
        h.candidate = ExecutableSpec::new(p);
    }
    if args.seed.is_some() {
        h.seed = args.seed;
    }
    if args.max_rounds.is_some() {
        h.max_rounds = args.max_rounds;
    }
    if let Some(ms) = args.timeout_ms {
        h.round_timeout_ms = ms;
    }
    if let Some(policy) = args.shape_policy {
        h.generator.shape_policy = policy;
    }
    if args.artifact_dir.is_some() {
        h.artifact_dir = args.artifact_dir;
    }
    h.validate()?;
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("interrupt received, stopping");
}

async fn run(mut config: AppConfig, source: ConfigSource, args: RunArgs) -> Result<ExitCode> {
    apply_overrides(&mut config, args)?;
    let _log_guard = logging::init_logging(&config);
    tracing::info!("Starting matrix_diff ({})", env!("GIT_HASH"));

    let harness = config.harness;
    let encoding = harness.encoding;
    let artifact_dir = harness.artifact_dir.clone();
    let replay = Replay::new(source, &harness.generator);

    let mut session = Session::new(harness).with_progress(true);
    println!("session seed: {}", session.session_seed());
    let state = session.run(wait_for_ctrl_c()).await?.clone();
    println!();

    let stats = session.stats();
    println!("{} rounds, {} matched", stats.rounds, stats.matches);

    let outcome = match state {
        SessionState::Halted(HaltReason::Finding(outcome)) => outcome,
        SessionState::Halted(HaltReason::RoundLimit) => {
            println!("round limit reached without divergence");
            return Ok(ExitCode::SUCCESS);
        }
        SessionState::Halted(HaltReason::Interrupted) | SessionState::Running => {
            println!("interrupted");
            return Ok(ExitCode::SUCCESS);
        }
    };

    let Some(report) = render_outcome(&outcome, encoding, &replay) else {
        return Ok(ExitCode::SUCCESS);
    };
    println!("{}", report);

    if let (Some(dir), Some(finding)) = (artifact_dir, outcome.finding()) {
        let path = write_artifacts(Path::new(&dir), outcome.label(), finding, &report)
            .with_context(|| format!("writing artifacts under {}", dir))?;
        println!("artifacts: {}", path.display());
    }
    Ok(ExitCode::from(1))
}

fn generate(
    mut config: AppConfig,
    seed: Option<u64>,
    count: u64,
    shape_policy: Option<ShapePolicy>,
) -> Result<ExitCode> {
    let generator = &mut config.harness.generator;
    if let Some(policy) = shape_policy {
        generator.shape_policy = policy;
    }
    print!("{}", replay_listing(generator, seed, count));
    Ok(ExitCode::SUCCESS)
}

fn check(config: &AppConfig, path: &str) -> Result<ExitCode> {
    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?
    };
    match ProblemInstance::from_wire(text, config.harness.generator.max_dim) {
        Ok(instance) => {
            println!("ok: {}", instance.summary());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("invalid: {}", e);
            Ok(ExitCode::from(1))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = async move {
        let source = ConfigSource::from_cli(&cli.env, cli.config.as_deref());
        let config = source.load()?;
        match cli.cmd {
            None => run(config, source, RunArgs::default()).await,
            Some(Cmd::Run(args)) => run(config, source, args).await,
            Some(Cmd::Generate {
                seed,
                count,
                shape_policy,
            }) => generate(config, seed, count, shape_policy),
            Some(Cmd::Check { path }) => check(&config, &path),
        }
    }
    .await;

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("matrix_diff failed: {e:#}");
            ExitCode::from(2)
        }
    }
}
