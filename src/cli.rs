use crate::config::RootOwnedPolicy;
use crate::error::{DeployError, Result};
use crate::host::Host;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::warn;

const AFTER_HELP: &str = "\
Examples:
  docker-deploy deploy
  docker-deploy deploy ./my_project
  docker-deploy deploy ./my_project /production/my_project
  docker-deploy up ./my_project
  docker-deploy down ./my_project
  docker-deploy backup ./my_project
  docker-deploy info

Bash completion, in ~/.bashrc:

  _docker_deploy() {
      local cur prev words cword
      _init_completion || return
      if ((cword == 1)); then
          COMPREPLY=($(compgen -W \"info backup deploy up down build\" -- \"$cur\"))
      else
          _filedir
      fi
  }
  complete -F _docker_deploy -o default docker-deploy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Run `docker ps`
    Info,
    /// Stop the stack, snapshot /opt/<name>/data, start it again
    Backup,
    /// Fix volume ownership and run `up -d`
    Up,
    /// Run `down`
    Down,
    /// Run `build`
    Build,
    /// Build and back up in place, or replace REPLACE_PATH with PROJECT_PATH
    Deploy,
}

#[derive(Debug, Parser)]
#[command(
    name = "docker-deploy",
    version,
    about = "Deploy, back up, start and stop docker compose projects",
    after_help = AFTER_HELP
)]
pub struct Cli {
    #[arg(value_enum)]
    pub action: Action,

    /// Project directory (defaults to the current directory)
    pub project_path: Option<PathBuf>,

    /// Deployed project to back up and replace (deploy only)
    pub replace_path: Option<PathBuf>,

    /// Root-owned volume policy: warn, fail or assign:<user>
    #[arg(long, value_name = "POLICY")]
    pub root_owned: Option<RootOwnedPolicy>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Absolute, existing directories the action operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub project: PathBuf,
    pub replace: Option<PathBuf>,
}

fn existing_dir<H: Host>(host: &H, path: &Path) -> Result<PathBuf> {
    if !host.is_dir(path) {
        return Err(DeployError::NoSuchProject(path.to_path_buf()));
    }
    host.canonicalize(path)
}

/// Validate both path arguments before anything runs.
pub fn resolve_targets<H: Host>(host: &H, cli: &Cli) -> Result<Targets> {
    let project = match &cli.project_path {
        Some(p) => existing_dir(host, p)?,
        None => {
            let cwd = host.current_dir()?;
            host.canonicalize(&cwd)?
        }
    };

    let replace = match &cli.replace_path {
        Some(p) => Some(existing_dir(host, p)?),
        None => None,
    };
    if replace.is_some() && cli.action != Action::Deploy {
        warn!(action = ?cli.action, "replace path is only used by deploy, ignoring it");
    }

    Ok(Targets { project, replace })
}
