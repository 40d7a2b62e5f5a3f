use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const ENV_FILE: &str = "env";

/// Candidate operator env files, most specific first.
pub fn env_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("docker-deploy").join(ENV_FILE));
    }
    files.push(PathBuf::from("/etc/docker-deploy").join(ENV_FILE));
    files
}

/// Load each existing file into the process env. Variables that are already
/// set win, so earlier files take precedence over later ones.
pub fn load_env(files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut loaded = Vec::new();
    for file in files.iter().filter(|f| f.is_file()) {
        load_file(file)?;
        loaded.push(file.clone());
    }
    Ok(loaded)
}

fn load_file(path: &Path) -> Result<()> {
    dotenvy::from_path(path).with_context(|| format!("reading env file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn earlier_files_win_and_missing_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let user = dir.path().join("user.env");
        let system = dir.path().join("system.env");
        fs::write(&user, "DD_ENV_TEST_SHARED=user\n").expect("write user env");
        fs::write(
            &system,
            "DD_ENV_TEST_SHARED=system\nDD_ENV_TEST_SYSTEM_ONLY=yes\n",
        )
        .expect("write system env");

        let files = vec![user.clone(), dir.path().join("absent.env"), system.clone()];
        let loaded = load_env(&files).expect("env files should load");

        assert_eq!(loaded, vec![user, system]);
        assert_eq!(std::env::var("DD_ENV_TEST_SHARED").as_deref(), Ok("user"));
        assert_eq!(std::env::var("DD_ENV_TEST_SYSTEM_ONLY").as_deref(), Ok("yes"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let bad = dir.path().join("bad.env");
        fs::write(&bad, "DD_ENV_TEST_BAD='unterminated\n").expect("write bad env");

        let err = load_env(&[bad]).expect_err("malformed env should fail");
        assert!(err.to_string().contains("bad.env"));
    }
}
