use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use tracing::info;

mod adhoc;
mod cli;
mod config;
mod render;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("skiff error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match &cli.command {
        cli::Commands::Run(args) => run_digests(args).await,
        cli::Commands::Adhoc(args) => adhoc::handle(args).await,
    }
}

async fn run_digests(args: &cli::RunArgs) -> anyhow::Result<()> {
    let config = config::SkiffConfig::load_with_dotenv(&args.config)?;
    let jobs = config.jobs(&args.digests, args.since.as_deref())?;

    // Digests share nothing, so they run concurrently; outputs are written
    // in configuration order once everything has finished.
    let results =
        join_all(jobs.iter().map(|job| skiff_digest::run_digest(&job.request))).await;

    let mut last_rate_limit = None;
    for (job, result) in jobs.iter().zip(results) {
        let digest = result?;
        if digest.rate_limit.is_some() {
            last_rate_limit = digest.rate_limit.clone();
        }
        let markdown = render::render_digest(&digest);
        match &job.output {
            Some(path) => {
                std::fs::write(path, &markdown)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(output = %path.display(), "digest written");
            }
            None => print!("{markdown}"),
        }
    }

    if let Some(snapshot) = last_rate_limit {
        info!(
            resource = %snapshot.resource,
            remaining = snapshot.remaining,
            limit = snapshot.limit,
            reset = %snapshot.reset_when,
            "rate limit after run"
        );
    }
    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("SKIFF_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
