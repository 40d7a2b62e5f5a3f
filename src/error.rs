use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeployError>;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no such project directory: {}", .0.display())]
    NoSuchProject(PathBuf),

    #[error("could not find any of [{candidates}] in {}", .dir.display())]
    ComposeFileMissing { dir: PathBuf, candidates: String },

    #[error("found compose file at {} but no 'services' in it", .0.display())]
    ServicesMissing(PathBuf),

    #[error("invalid compose file {}", .path.display())]
    ComposeParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("user '{user}' is not a member of the '{group}' group")]
    NotInGroup { user: String, group: String },

    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` (in {}) exited with status {code}{}", .cwd.display(), stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        cwd: PathBuf,
        code: i32,
        stderr: String,
    },

    #[error("volume {} is owned by root", .0.display())]
    RootOwnedVolume(PathBuf),

    #[error("refusing to replace {} with itself", .0.display())]
    SelfReplace(PathBuf),

    #[error(
        "replacing {} was interrupted; the previous deployment is preserved at {}",
        .target.display(),
        .preserved.display()
    )]
    ReplaceInterrupted {
        target: PathBuf,
        preserved: PathBuf,
        #[source]
        source: Box<DeployError>,
    },

    #[error("{}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl DeployError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            source,
        }
    }

    /// Copy-pastable remediation printed after the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            DeployError::NotInGroup { user, group } => Some(format!(
                "sudo usermod -a -G {group} {user}\nThen open a new shell"
            )),
            DeployError::RootOwnedVolume(path) => {
                Some(format!("sudo chown -R OWNER_HERE {}", path.display()))
            }
            DeployError::ReplaceInterrupted {
                target, preserved, ..
            } => Some(format!(
                "inspect {} and restore with: mv {} {}",
                target.display(),
                preserved.display(),
                target.display()
            )),
            _ => None,
        }
    }
}
