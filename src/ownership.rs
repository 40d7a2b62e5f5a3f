use crate::compose::{VolumeOwner, ROOT_OWNER};
use crate::config::{Config, RootOwnedPolicy};
use crate::docker;
use crate::error::{DeployError, Result};
use crate::host::Host;
use crate::process::{run_checked, ProcessRunner};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Declared but not created yet; reported only.
    Missing(PathBuf),
    /// Owned by root and left alone under [`RootOwnedPolicy::Warn`].
    RootOwned(PathBuf),
    Repaired { path: PathBuf, owner: String },
}

/// Re-apply each volume's owner recursively. Runs before every `up`, so
/// drift inside a volume is corrected on each start.
pub async fn repair_volumes<H, R>(
    host: &H,
    runner: &R,
    cfg: &Config,
    volumes: &[VolumeOwner],
) -> Result<Vec<RepairOutcome>>
where
    H: Host,
    R: ProcessRunner,
{
    let mut outcomes = Vec::with_capacity(volumes.len());

    for volume in volumes {
        let path = &volume.path;

        if !host.is_dir(path) {
            warn!(path = %path.display(), "volume directory missing, create it with a non-root owner");
            eprintln!(
                "sudo mkdir -p {p} && sudo chown -R OWNER_HERE {p}",
                p = path.display()
            );
            outcomes.push(RepairOutcome::Missing(path.clone()));
            continue;
        }

        let owner = if volume.owner == ROOT_OWNER {
            match &cfg.root_owned {
                RootOwnedPolicy::Warn => {
                    warn!(path = %path.display(), "volume owned by root, set a non-root owner");
                    eprintln!("sudo chown -R OWNER_HERE {}", path.display());
                    outcomes.push(RepairOutcome::RootOwned(path.clone()));
                    continue;
                }
                RootOwnedPolicy::Fail => return Err(DeployError::RootOwnedVolume(path.clone())),
                RootOwnedPolicy::Assign(user) => user.as_str(),
            }
        } else {
            volume.owner.as_str()
        };

        info!(path = %path.display(), owner, "fixing volume ownership");
        run_checked(runner, &docker::chown_recursive(cfg, owner, path)).await?;
        outcomes.push(RepairOutcome::Repaired {
            path: path.clone(),
            owner: owner.to_string(),
        });
    }

    Ok(outcomes)
}
