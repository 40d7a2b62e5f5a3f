//! Compose file discovery and host-side volume extraction.
//!
//! Only bind-style sources (`/abs`, `./rel`, `~/home`) name host paths.
//! Named volumes and container-only anonymous volumes live inside docker and
//! are never considered for ownership repair.

use crate::config::Config;
use crate::error::{DeployError, Result};
use crate::host::Host;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Checked in order; the first regular file wins.
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Owner recorded for a declared host path that does not exist yet.
pub const ROOT_OWNER: &str = "root";

pub fn find_compose_file<H: Host>(host: &H, dir: &Path) -> Result<PathBuf> {
    COMPOSE_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| host.is_file(candidate))
        .ok_or_else(|| DeployError::ComposeFileMissing {
            dir: dir.to_path_buf(),
            candidates: COMPOSE_FILES.join(", "),
        })
}

#[derive(Debug, Deserialize)]
struct ComposeDocument {
    services: Option<serde_yaml::Mapping>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceBody {
    #[serde(default)]
    volumes: Option<Vec<VolumeEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VolumeEntry {
    Short(String),
    Long(LongVolume),
}

#[derive(Debug, Deserialize)]
struct LongVolume {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeclaration {
    pub name: String,
    pub mounts: Vec<VolumeMount>,
}

/// Host side of a bind mount as written in the compose file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub declared: String,
}

impl VolumeMount {
    /// Absolute host path; relative sources resolve against `project`.
    pub fn host_path(&self, project: &Path) -> PathBuf {
        let raw = self.declared.as_str();
        let joined = if raw == "~" || raw.starts_with("~/") {
            match dirs::home_dir() {
                Some(home) => home.join(raw.trim_start_matches('~').trim_start_matches('/')),
                None => PathBuf::from(raw),
            }
        } else {
            project.join(raw)
        };
        normalize(&joined)
    }
}

/// (hostPath, ownerName) for one extracted volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeOwner {
    pub path: PathBuf,
    pub owner: String,
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// How a declared volume source relates to the host filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `/abs`, `./rel` or `~/home`.
    HostPath,
    /// Contains `${...}`; only compose can resolve it.
    Interpolated,
    /// Named volume, managed by docker.
    Docker,
}

pub fn classify_source(source: &str) -> SourceKind {
    if source.contains("${") {
        SourceKind::Interpolated
    } else if source.starts_with('/') || source.starts_with('.') || source.starts_with('~') {
        SourceKind::HostPath
    } else {
        SourceKind::Docker
    }
}

impl VolumeEntry {
    /// Source side of a mount that can point at the host.
    fn source(&self) -> Option<&str> {
        match self {
            // `host:container[:mode]`; a lone path is a container-only volume.
            VolumeEntry::Short(spec) => {
                let mut parts = spec.splitn(2, ':');
                let host = parts.next()?;
                parts.next()?;
                Some(host)
            }
            VolumeEntry::Long(long) => match long.kind.as_deref() {
                None | Some("bind") => long.source.as_deref(),
                _ => None,
            },
        }
    }
}

/// Parse a compose document into its services, in document order.
pub fn parse_services(path: &Path, text: &str) -> Result<Vec<ServiceDeclaration>> {
    let parse_err = |source| DeployError::ComposeParse {
        path: path.to_path_buf(),
        source,
    };
    // Expand `<<: *anchor` merge keys, as the `x-common: &common` pattern relies on them.
    let mut value: serde_yaml::Value = serde_yaml::from_str(text).map_err(parse_err)?;
    value.apply_merge().map_err(parse_err)?;
    let doc: ComposeDocument = serde_yaml::from_value(value).map_err(parse_err)?;
    let services = doc
        .services
        .ok_or_else(|| DeployError::ServicesMissing(path.to_path_buf()))?;

    let mut out = Vec::with_capacity(services.len());
    for (name, body) in services {
        let name = name.as_str().map(str::to_string).unwrap_or_else(|| format!("{name:?}"));
        let body: ServiceBody = if body.is_null() {
            ServiceBody::default()
        } else {
            serde_yaml::from_value(body).map_err(parse_err)?
        };

        let mut mounts = Vec::new();
        for entry in body.volumes.unwrap_or_default() {
            let Some(src) = entry.source() else {
                debug!(service = %name, ?entry, "container-only volume, ignoring");
                continue;
            };
            match classify_source(src) {
                SourceKind::HostPath => mounts.push(VolumeMount {
                    declared: src.to_string(),
                }),
                SourceKind::Interpolated => warn!(
                    service = %name,
                    source = src,
                    "volume source uses variable interpolation, ownership not managed"
                ),
                SourceKind::Docker => debug!(service = %name, source = src, "named volume, ignoring"),
            }
        }
        out.push(ServiceDeclaration { name, mounts });
    }
    Ok(out)
}

/// Locate the compose file in `project`, then resolve each declared host
/// path to its current owner.
///
/// Missing paths are recorded with [`ROOT_OWNER`] so the repairer can report
/// them. Existing paths count only when declared absolute and under the
/// sanctioned root; the rest are dropped with a warning.
pub fn volume_owners<H: Host>(host: &H, cfg: &Config, project: &Path) -> Result<Vec<VolumeOwner>> {
    let compose = find_compose_file(host, project)?;
    let text = host.read_to_string(&compose)?;

    let mut owners = Vec::new();
    for service in parse_services(&compose, &text)? {
        for mount in &service.mounts {
            let path = mount.host_path(project);

            if !host.is_dir(&path) {
                owners.push(VolumeOwner {
                    path,
                    owner: ROOT_OWNER.to_string(),
                });
                continue;
            }

            // Judged on the source as written: relative and `~` sources never qualify.
            let declared_absolute = Path::new(&mount.declared).is_absolute();
            if !declared_absolute || !cfg.is_sanctioned(&path) {
                warn!(
                    service = %service.name,
                    path = %path.display(),
                    "skipping volume, must be under {}/",
                    cfg.opt_root.display()
                );
                continue;
            }

            let owner = host.owner_name(&path)?;
            owners.push(VolumeOwner { path, owner });
        }
    }
    Ok(owners)
}
