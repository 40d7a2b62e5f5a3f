use crate::error::{DeployError, Result};
use nix::unistd::{Gid, Group, Uid, User};
use std::ffi::OsString;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only view of the host: filesystem state and the user/group database.
/// Anything that changes the host goes through a `ProcessRunner` instead.
pub trait Host {
    fn is_dir(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Name of the user owning `path`; the numeric uid when it has no passwd entry.
    fn owner_name(&self, path: &Path) -> Result<String>;
    /// Entry names directly inside `path`, sorted.
    fn list_dir(&self, path: &Path) -> Result<Vec<OsString>>;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
    fn current_dir(&self) -> Result<PathBuf>;
    fn current_user(&self) -> String;
    fn in_group(&self, group: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

impl Host for LocalHost {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| DeployError::io(path, e))
    }

    fn owner_name(&self, path: &Path) -> Result<String> {
        let meta = std::fs::metadata(path).map_err(|e| DeployError::io(path, e))?;
        let uid = meta.uid();
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Ok(uid.to_string()),
            Err(e) => Err(DeployError::io(path, e.into())),
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<OsString>> {
        let rd = std::fs::read_dir(path).map_err(|e| DeployError::io(path, e))?;
        let mut names = Vec::new();
        for entry in rd {
            let entry = entry.map_err(|e| DeployError::io(path, e))?;
            names.push(entry.file_name());
        }
        names.sort();
        Ok(names)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        std::fs::canonicalize(path).map_err(|e| DeployError::io(path, e))
    }

    fn current_dir(&self) -> Result<PathBuf> {
        std::env::current_dir().map_err(|e| DeployError::io(".", e))
    }

    fn current_user(&self) -> String {
        User::from_uid(Uid::current())
            .ok()
            .flatten()
            .map(|u| u.name)
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| Uid::current().to_string())
    }

    fn in_group(&self, group: &str) -> Result<bool> {
        let mut gids = nix::unistd::getgroups()
            .map_err(|e| DeployError::io("/etc/group", e.into()))?;
        gids.push(Gid::effective());
        for gid in gids {
            if let Ok(Some(g)) = Group::from_gid(gid) {
                if g.name == group {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Fail unless the invoking user belongs to `group`.
pub fn require_group<H: Host>(host: &H, group: &str) -> Result<()> {
    if host.in_group(group)? {
        debug!(group, "group membership ok");
        return Ok(());
    }
    Err(DeployError::NotInGroup {
        user: host.current_user(),
        group: group.to_string(),
    })
}
