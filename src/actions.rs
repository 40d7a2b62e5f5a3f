//! Lifecycle, backup and deploy actions.
//!
//! Every step is an external command spawned with an explicit working
//! directory; the process's own cwd is never changed. Steps run strictly in
//! sequence and the first failing command aborts the action.

use crate::clock::{stamp, Clock};
use crate::compose::{find_compose_file, volume_owners};
use crate::config::Config;
use crate::docker;
use crate::error::{DeployError, Result};
use crate::host::Host;
use crate::ownership::{repair_volumes, RepairOutcome};
use crate::process::{run_checked, CommandSpec, ProcessRunner};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// `None` when the project has no data directory.
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub project: PathBuf,
    /// Where the replaced deployment was moved, in replace mode.
    pub preserved: Option<PathBuf>,
    pub backup: BackupReport,
}

pub struct Deployer<R, H, C> {
    pub cfg: Config,
    pub runner: R,
    pub host: H,
    pub clock: C,
}

/// Last path component of an absolute project directory.
pub fn project_name(project: &Path) -> Result<OsString> {
    project
        .file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| DeployError::Config(format!("{} has no directory name", project.display())))
}

impl<R, H, C> Deployer<R, H, C>
where
    R: ProcessRunner,
    H: Host,
    C: Clock,
{
    pub fn new(cfg: Config, runner: R, host: H, clock: C) -> Self {
        Deployer {
            cfg,
            runner,
            host,
            clock,
        }
    }

    /// Compose resolves the file itself; this only refuses to run without one.
    fn require_compose(&self, project: &Path) -> Result<()> {
        let file = find_compose_file(&self.host, project)?;
        debug!(file = %file.display(), "compose file");
        Ok(())
    }

    /// Repair volume ownership, then `up -d`.
    pub async fn up(&self, project: &Path) -> Result<Vec<RepairOutcome>> {
        self.require_compose(project)?;
        let volumes = volume_owners(&self.host, &self.cfg, project)?;
        let outcomes = repair_volumes(&self.host, &self.runner, &self.cfg, &volumes).await?;
        run_checked(&self.runner, &docker::compose_up(&self.cfg, project)).await?;
        Ok(outcomes)
    }

    pub async fn down(&self, project: &Path) -> Result<()> {
        self.require_compose(project)?;
        run_checked(&self.runner, &docker::compose_down(&self.cfg, project)).await?;
        Ok(())
    }

    pub async fn build(&self, project: &Path) -> Result<()> {
        self.require_compose(project)?;
        run_checked(&self.runner, &docker::compose_build(&self.cfg, project)).await?;
        Ok(())
    }

    pub async fn info(&self, cwd: &Path) -> Result<()> {
        run_checked(&self.runner, &docker::docker_ps(&self.cfg, cwd)).await?;
        Ok(())
    }

    /// Copy `<opt>/<name>/data` into `<opt>/<name>/backup/data_<stamp>`.
    /// The stack must already be stopped.
    pub async fn snapshot_data(&self, project: &Path) -> Result<BackupReport> {
        let name = project_name(project)?;
        let data = self.cfg.data_dir(&name);

        if !self.host.is_dir(&data) {
            println!("Skipping backup: Nothing to backup at {}", data.display());
            return Ok(BackupReport { snapshot: None });
        }

        let backup_dir = self.cfg.backup_dir(&name);
        let snapshot = backup_dir.join(format!("data_{}", stamp(self.clock.now())));
        let cwd = Path::new("/");

        run_checked(
            &self.runner,
            &docker::privileged(&self.cfg, cwd, "mkdir", ["-p"]).path_arg(&backup_dir),
        )
        .await?;
        // Another user may own the data, hence the privileged copy.
        run_checked(
            &self.runner,
            &docker::privileged(&self.cfg, cwd, "cp", ["-r"])
                .path_arg(&data)
                .path_arg(&snapshot),
        )
        .await?;
        run_checked(
            &self.runner,
            &docker::privileged(&self.cfg, cwd, "chmod", ["700"]).path_arg(&snapshot),
        )
        .await?;

        // The privileged copy belongs to root; give entries their original owners back.
        for entry in self.host.list_dir(&data)? {
            let owner = self.host.owner_name(&data.join(&entry))?;
            run_checked(
                &self.runner,
                &docker::chown_recursive(&self.cfg, &owner, &snapshot.join(&entry)),
            )
            .await?;
        }

        println!("\nBacked up data to {}\n", snapshot.display());
        Ok(BackupReport {
            snapshot: Some(snapshot),
        })
    }

    /// Stop the stack, snapshot its data, start it again.
    pub async fn backup(&self, project: &Path) -> Result<BackupReport> {
        self.require_compose(project)?;
        self.down(project).await?;
        let report = self.snapshot_data(project).await?;
        self.up(project).await?;
        Ok(report)
    }

    /// Build and back up in place, or replace `replace` with `project`.
    pub async fn deploy(&self, project: &Path, replace: Option<&Path>) -> Result<DeployReport> {
        let Some(target) = replace else {
            self.build(project).await?;
            let backup = self.backup(project).await?;
            return Ok(DeployReport {
                project: project.to_path_buf(),
                preserved: None,
                backup,
            });
        };

        if project == target {
            return Err(DeployError::SelfReplace(target.to_path_buf()));
        }

        self.require_compose(target)?;
        self.build(project).await?;
        self.down(target).await?;

        let preserved = sibling_with_stamp(target, &stamp(self.clock.now()))?;
        let root = Path::new("/");
        run_checked(
            &self.runner,
            &CommandSpec::new("mv", root)
                .path_arg(target)
                .path_arg(&preserved)
                .captured(),
        )
        .await?;
        info!(from = %target.display(), to = %preserved.display(), "previous deployment moved aside");

        let finish = async {
            run_checked(
                &self.runner,
                &CommandSpec::new("cp", root)
                    .arg("-r")
                    .path_arg(project)
                    .path_arg(target)
                    .captured(),
            )
            .await?;
            self.backup(target).await
        };

        match finish.await {
            Ok(backup) => Ok(DeployReport {
                project: target.to_path_buf(),
                preserved: Some(preserved),
                backup,
            }),
            Err(source) => Err(DeployError::ReplaceInterrupted {
                target: target.to_path_buf(),
                preserved,
                source: Box::new(source),
            }),
        }
    }
}

/// `/prod/app` -> `/prod/app_<stamp>`
fn sibling_with_stamp(target: &Path, stamp: &str) -> Result<PathBuf> {
    let mut name = project_name(target)?;
    name.push(format!("_{stamp}"));
    Ok(target.with_file_name(name))
}
