use std::{
  fs,
  path::{Path, PathBuf},
  process::Command,
};

use anyhow::{Context, Result};

/// Directory-name prefix marking the alternate interpreter family.
const PYPY_PREFIX: &str = "pypy-";

/// One provisioned interpreter environment under `venv/`.
#[derive(Debug, Clone)]
pub struct Environment {
  /// Directory name under `venv/`, e.g. `2.7.8` or `pypy-2.3.1`.
  pub id: String,
  root: PathBuf,
}

impl Environment {
  pub fn new<S: Into<String>>(venv_dir: &Path, id: S) -> Self {
    let id = id.into();
    let root = venv_dir.join(&id);

    Self { id, root }
  }

  /// Every provisioned environment, sorted by identifier so that sweep and
  /// combined-row order do not depend on directory-listing order.
  pub fn discover(venv_dir: &Path) -> Result<Vec<Environment>> {
    let mut ids = fs::read_dir(venv_dir)
      .with_context(|| format!("read {venv_dir:?}"))?
      .map(|entry| Ok(entry.context("read entry")?.file_name().to_string_lossy().into_owned()))
      .collect::<Result<Vec<_>>>()?;
    ids.sort();

    Ok(ids.into_iter().map(|id| Environment::new(venv_dir, id)).collect())
  }

  pub fn exists(&self) -> bool {
    self.root.is_dir()
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Display label, distinguishing PyPy environments from the reference
  /// implementation.
  pub fn label(&self) -> String {
    match self.id.strip_prefix(PYPY_PREFIX) {
      Some(version) => format!("PyPy {version}"),
      None => format!("CPython {}", self.id),
    }
  }

  /// A command for a binary under this environment's `bin/`, activated the
  /// way a shell `activate` would: `VIRTUAL_ENV` set and `bin/` prepended
  /// to `PATH`.
  pub fn command(&self, program: &str) -> Command {
    let bin_dir = self.root.join("bin");

    let mut cmd = Command::new(bin_dir.join(program));
    cmd.env("VIRTUAL_ENV", &self.root);

    if let Some(path) = std::env::var_os("PATH") {
      let paths = std::iter::once(bin_dir).chain(std::env::split_paths(&path));
      if let Ok(joined) = std::env::join_paths(paths) {
        cmd.env("PATH", joined);
      }
    }

    cmd
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn labels_distinguish_interpreter_families() {
    let venv_dir = Path::new("/srv/timeit/venv");

    assert_eq!(Environment::new(venv_dir, "2.7.8").label(), "CPython 2.7.8");
    assert_eq!(Environment::new(venv_dir, "pypy-2.3.1").label(), "PyPy 2.3.1");
  }

  #[test]
  fn discover_sorts_by_identifier() {
    let venv_dir = TempDir::new().unwrap();
    for id in ["pypy-2.3.1", "3.4.0", "2.7.8"] {
      fs::create_dir(venv_dir.path().join(id)).unwrap();
    }

    let ids: Vec<String> = Environment::discover(venv_dir.path())
      .unwrap()
      .into_iter()
      .map(|env| env.id)
      .collect();

    assert_eq!(ids, ["2.7.8", "3.4.0", "pypy-2.3.1"]);
  }

  #[test]
  fn commands_resolve_to_the_environment_bin_dir() {
    let env = Environment::new(Path::new("/srv/timeit/venv"), "2.7.8");
    let cmd = env.command("python");

    assert_eq!(cmd.get_program(), Path::new("/srv/timeit/venv/2.7.8/bin/python").as_os_str());
    assert!(cmd
      .get_envs()
      .any(|(key, value)| key == "VIRTUAL_ENV" && value == Some(env.root().as_os_str())));
  }
}
