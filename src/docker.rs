use crate::config::Config;
use crate::process::CommandSpec;
use std::ffi::OsString;
use std::path::Path;

/// `<compose> <args...>` run from the project directory.
///
/// No `-f`: compose picks the project file itself and merges any
/// `docker-compose.override.yml` next to it.
pub fn compose(cfg: &Config, project: &Path, args: &[&str]) -> CommandSpec {
    let (bin, prefix) = match cfg.compose_cmd.split_first() {
        Some((bin, rest)) => (bin.as_str(), rest),
        None => ("docker-compose", &[][..]),
    };
    CommandSpec::new(bin, project)
        .args(prefix.iter().map(String::as_str))
        .args(args.iter().copied())
}

pub fn compose_up(cfg: &Config, project: &Path) -> CommandSpec {
    compose(cfg, project, &["up", "-d"])
}

pub fn compose_down(cfg: &Config, project: &Path) -> CommandSpec {
    compose(cfg, project, &["down"])
}

pub fn compose_build(cfg: &Config, project: &Path) -> CommandSpec {
    compose(cfg, project, &["build"])
}

/// `docker ps`, passed straight through to the terminal.
pub fn docker_ps(cfg: &Config, cwd: &Path) -> CommandSpec {
    CommandSpec::new(&cfg.docker_bin, cwd).arg("ps")
}

/// `[sudo] <program> <args...>` with captured output.
pub fn privileged<I, S>(cfg: &Config, cwd: &Path, program: &str, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let cmd = match &cfg.sudo {
        Some(sudo) => CommandSpec::new(sudo, cwd).arg(program),
        None => CommandSpec::new(program, cwd),
    };
    cmd.args(args).captured()
}

pub fn chown_recursive(cfg: &Config, owner: &str, path: &Path) -> CommandSpec {
    privileged(cfg, Path::new("/"), "chown", ["-R", owner]).path_arg(path)
}
