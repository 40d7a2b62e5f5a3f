use crate::error::{DeployError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do with a volume directory that exists but is owned by root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RootOwnedPolicy {
    /// Leave it alone and print the command that would fix it.
    #[default]
    Warn,
    /// Abort before starting the stack.
    Fail,
    /// Hand it to the given user.
    Assign(String),
}

impl FromStr for RootOwnedPolicy {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" | "warn" => Ok(RootOwnedPolicy::Warn),
            "fail" => Ok(RootOwnedPolicy::Fail),
            _ => match s.strip_prefix("assign:").map(str::trim) {
                Some(user) if !user.is_empty() && user != "root" => {
                    Ok(RootOwnedPolicy::Assign(user.to_string()))
                }
                _ => Err(DeployError::Config(format!(
                    "root-owned policy must be 'warn', 'fail' or 'assign:<user>', got '{s}'"
                ))),
            },
        }
    }
}

impl fmt::Display for RootOwnedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootOwnedPolicy::Warn => f.write_str("warn"),
            RootOwnedPolicy::Fail => f.write_str("fail"),
            RootOwnedPolicy::Assign(user) => write!(f, "assign:{user}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub docker_bin: String,
    /// Orchestrator command line, e.g. `["docker-compose"]` or `["docker", "compose"]`.
    pub compose_cmd: Vec<String>,
    /// Privilege prefix for chown/cp/mkdir; `None` runs them directly.
    pub sudo: Option<String>,
    /// Sanctioned root for volume repair and the data/backup convention.
    pub opt_root: PathBuf,
    pub required_group: String,
    pub root_owned: RootOwnedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            docker_bin: "docker".to_string(),
            compose_cmd: vec!["docker-compose".to_string()],
            sudo: Some("sudo".to_string()),
            opt_root: PathBuf::from("/opt"),
            required_group: "docker".to_string(),
            root_owned: RootOwnedPolicy::Warn,
        }
    }
}

impl Config {
    /// `<opt_root>/<name>/data`
    pub fn data_dir(&self, project_name: impl AsRef<Path>) -> PathBuf {
        self.opt_root.join(project_name).join("data")
    }

    /// `<opt_root>/<name>/backup`
    pub fn backup_dir(&self, project_name: impl AsRef<Path>) -> PathBuf {
        self.opt_root.join(project_name).join("backup")
    }

    /// Strictly below the sanctioned root; the root itself does not count.
    pub fn is_sanctioned(&self, path: &Path) -> bool {
        path.starts_with(&self.opt_root) && path != self.opt_root
    }
}

/// Build the config from the process environment.
pub fn get_config() -> Result<Config> {
    config_from(|key| std::env::var(key).ok())
}

pub fn config_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let docker_bin = lookup("DOCKER_BIN")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(defaults.docker_bin);

    let compose_cmd = match lookup("COMPOSE_BIN") {
        Some(raw) => {
            let words: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
            if words.is_empty() {
                return Err(DeployError::Config("COMPOSE_BIN is empty".to_string()));
            }
            words
        }
        None => defaults.compose_cmd,
    };

    // Set-but-empty disables the prefix (already running as root).
    let sudo = match lookup("DOCKER_DEPLOY_SUDO") {
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(s.trim().to_string()),
        None => defaults.sudo,
    };

    let opt_root = match lookup("DOCKER_DEPLOY_OPT_ROOT") {
        Some(raw) => {
            let p = PathBuf::from(raw.trim().trim_end_matches('/'));
            if !p.is_absolute() || p == Path::new("/") {
                return Err(DeployError::Config(format!(
                    "DOCKER_DEPLOY_OPT_ROOT must be an absolute directory below '/', got '{raw}'"
                )));
            }
            p
        }
        None => defaults.opt_root,
    };

    let required_group = lookup("DOCKER_DEPLOY_GROUP")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(defaults.required_group);

    let root_owned = match lookup("DOCKER_DEPLOY_ROOT_OWNED") {
        Some(raw) => raw.parse()?,
        None => defaults.root_owned,
    };

    Ok(Config {
        docker_bin,
        compose_cmd,
        sudo,
        opt_root,
        required_group,
        root_owned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config_from(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_match_conventions() {
        let cfg = from_pairs(&[]).expect("defaults are valid");
        assert_eq!(cfg.docker_bin, "docker");
        assert_eq!(cfg.compose_cmd, vec!["docker-compose"]);
        assert_eq!(cfg.sudo.as_deref(), Some("sudo"));
        assert_eq!(cfg.data_dir("app"), PathBuf::from("/opt/app/data"));
        assert_eq!(cfg.backup_dir("app"), PathBuf::from("/opt/app/backup"));
        assert_eq!(cfg.root_owned, RootOwnedPolicy::Warn);
    }

    #[test]
    fn compose_plugin_form_is_split() {
        let cfg = from_pairs(&[("COMPOSE_BIN", "docker  compose")]).expect("valid");
        assert_eq!(cfg.compose_cmd, vec!["docker", "compose"]);
        assert!(from_pairs(&[("COMPOSE_BIN", "  ")]).is_err());
    }

    #[test]
    fn empty_sudo_disables_prefix() {
        let cfg = from_pairs(&[("DOCKER_DEPLOY_SUDO", "")]).expect("valid");
        assert_eq!(cfg.sudo, None);
    }

    #[test]
    fn opt_root_must_be_absolute_and_not_slash() {
        let cfg = from_pairs(&[("DOCKER_DEPLOY_OPT_ROOT", "/srv/")]).expect("valid");
        assert_eq!(cfg.opt_root, PathBuf::from("/srv"));
        assert!(from_pairs(&[("DOCKER_DEPLOY_OPT_ROOT", "srv")]).is_err());
        assert!(from_pairs(&[("DOCKER_DEPLOY_OPT_ROOT", "/")]).is_err());
    }

    #[test]
    fn sanctioned_means_strictly_below_root() {
        let cfg = Config::default();
        assert!(cfg.is_sanctioned(Path::new("/opt/app/data")));
        assert!(!cfg.is_sanctioned(Path::new("/opt")));
        assert!(!cfg.is_sanctioned(Path::new("/optional/x")));
        assert!(!cfg.is_sanctioned(Path::new("/var/lib/x")));
    }

    #[test]
    fn root_owned_policy_parses() {
        assert_eq!("warn".parse::<RootOwnedPolicy>().ok(), Some(RootOwnedPolicy::Warn));
        assert_eq!("fail".parse::<RootOwnedPolicy>().ok(), Some(RootOwnedPolicy::Fail));
        assert_eq!(
            "assign:deploy".parse::<RootOwnedPolicy>().ok(),
            Some(RootOwnedPolicy::Assign("deploy".to_string()))
        );
        assert!("assign:".parse::<RootOwnedPolicy>().is_err());
        assert!("assign:root".parse::<RootOwnedPolicy>().is_err());
        assert!("yolo".parse::<RootOwnedPolicy>().is_err());
        assert!(from_pairs(&[("DOCKER_DEPLOY_ROOT_OWNED", "nope")]).is_err());
    }
}
