#[cfg(not(unix))]
compile_error!("docker-deploy manages ownership with unix tools and only builds on unix hosts");

mod actions;
mod cli;
mod clock;
mod compose;
mod config;
mod docker;
mod env;
mod error;
mod host;
mod ownership;
mod process;
#[cfg(test)]
mod testing;

use actions::Deployer;
use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Action, Cli};
use host::{Host, LocalHost};
use tracing::debug;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        if let Some(hint) = err.downcast_ref::<error::DeployError>().and_then(|e| e.hint()) {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    for file in env::load_env(&env::env_files())? {
        debug!(file = %file.display(), "loaded env file");
    }

    let mut cfg = config::get_config()?;
    if let Some(policy) = cli.root_owned.clone() {
        cfg.root_owned = policy;
    }
    debug!(?cfg, "configuration");

    let host = LocalHost;
    host::require_group(&host, &cfg.required_group)?;
    let targets = cli::resolve_targets(&host, &cli)?;
    let project = targets.project.as_path();

    let deployer = Deployer::new(cfg, process::SystemRunner, host, clock::SystemClock);

    match cli.action {
        Action::Info => deployer.info(&deployer.host.current_dir()?).await?,
        Action::Up => {
            deployer.up(project).await?;
        }
        Action::Down => deployer.down(project).await?,
        Action::Build => deployer.build(project).await?,
        Action::Backup => {
            deployer.backup(project).await?;
        }
        Action::Deploy => {
            let report = deployer.deploy(project, targets.replace.as_deref()).await?;
            if let Some(preserved) = &report.preserved {
                println!(
                    "Backed up project {} to {} replaced with {}",
                    report.project.display(),
                    preserved.display(),
                    project.display()
                );
                println!("You can now delete {}", project.display());
            }
        }
    }

    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("DOCKER_DEPLOY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing subscriber: {e}"))
}
