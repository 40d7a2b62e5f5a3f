//! In-memory stand-ins for the host, the process runner and the clock.

use crate::clock::Clock;
use crate::error::{DeployError, Result};
use crate::host::Host;
use crate::process::{CommandSpec, ProcessOutput, ProcessRunner};
use chrono::{DateTime, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Entry {
    Dir { owner: String },
    File { owner: String, contents: String },
}

#[derive(Debug, Clone)]
pub struct FakeHost {
    entries: BTreeMap<PathBuf, Entry>,
    cwd: PathBuf,
    user: String,
    groups: Vec<String>,
}

impl FakeHost {
    pub fn new() -> Self {
        FakeHost {
            entries: BTreeMap::new(),
            cwd: PathBuf::from("/home/alice"),
            user: "alice".to_string(),
            groups: vec!["alice".to_string(), "docker".to_string()],
        }
    }

    /// Adds a directory (and any missing parents, owned by root).
    pub fn dir(mut self, path: &str, owner: &str) -> Self {
        self.add_parents(Path::new(path));
        self.entries.insert(
            PathBuf::from(path),
            Entry::Dir {
                owner: owner.to_string(),
            },
        );
        self
    }

    pub fn file(mut self, path: &str, owner: &str, contents: &str) -> Self {
        self.add_parents(Path::new(path));
        self.entries.insert(
            PathBuf::from(path),
            Entry::File {
                owner: owner.to_string(),
                contents: contents.to_string(),
            },
        );
        self
    }

    pub fn cwd(mut self, path: &str) -> Self {
        self.cwd = PathBuf::from(path);
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    pub fn groups<const N: usize>(mut self, groups: [&str; N]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            self.entries.entry(p.to_path_buf()).or_insert(Entry::Dir {
                owner: "root".to_string(),
            });
            parent = p.parent();
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        joined.components().collect()
    }

    fn not_found(path: &Path) -> DeployError {
        DeployError::io(path, io::Error::from(io::ErrorKind::NotFound))
    }
}

impl Host for FakeHost {
    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries.get(&self.absolute(path)), Some(Entry::Dir { .. }))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.entries.get(&self.absolute(path)), Some(Entry::File { .. }))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.entries.get(&self.absolute(path)) {
            Some(Entry::File { contents, .. }) => Ok(contents.clone()),
            _ => Err(Self::not_found(path)),
        }
    }

    fn owner_name(&self, path: &Path) -> Result<String> {
        match self.entries.get(&self.absolute(path)) {
            Some(Entry::Dir { owner }) | Some(Entry::File { owner, .. }) => Ok(owner.clone()),
            None => Err(Self::not_found(path)),
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<OsString>> {
        let dir = self.absolute(path);
        if !self.is_dir(&dir) {
            return Err(Self::not_found(path));
        }
        Ok(self
            .entries
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_os_string())
            .collect())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let abs = self.absolute(path);
        if self.entries.contains_key(&abs) {
            Ok(abs)
        } else {
            Err(Self::not_found(path))
        }
    }

    fn current_dir(&self) -> Result<PathBuf> {
        Ok(self.cwd.clone())
    }

    fn current_user(&self) -> String {
        self.user.clone()
    }

    fn in_group(&self, group: &str) -> Result<bool> {
        Ok(self.groups.iter().any(|g| g == group))
    }
}

/// Records every command and answers with exit code 0, unless a command's
/// rendered text contains one of the configured failure patterns.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<CommandSpec>>,
    failures: Vec<(String, i32)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, pattern: &str, code: i32) -> Self {
        self.failures.push((pattern.to_string(), code));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }
}

impl ProcessRunner for RecordingRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput> {
        self.calls.borrow_mut().push(cmd.clone());
        let rendered = cmd.to_string();
        let code = self
            .failures
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);
        Ok(ProcessOutput {
            code,
            ..ProcessOutput::default()
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        FixedClock(
            Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
                .single()
                .expect("valid fixed date"),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
