use std::{
  path::PathBuf,
  process::Command,
};

use anyhow::{Context, Result};

use crate::{
  config::Config,
  env::Environment,
  ext::CommandExt,
};

/// The library under test: a git checkout whose `examples/` tree holds the
/// benchmark programs and the `speed.txt` manifest.
pub struct Library {
  url: String,
  name: String,
  dir: PathBuf,
}

impl Library {
  pub fn new(config: &Config) -> Self {
    Self {
      url: config.library_url.clone(),
      name: config.library_name.clone(),
      dir: config.library_dir(),
    }
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.dir.join("examples").join("speed.txt")
  }

  pub fn example_dir(&self, group: &str) -> PathBuf {
    self.dir.join("examples").join(group)
  }

  /// Clones the library if absent, then scrubs compiled leftovers and
  /// returns the checkout to an up-to-date master.
  pub fn clean_pull(&self) -> Result<()> {
    if !self.dir.exists() {
      Command::new("git")
        .args(["clone", &self.url])
        .arg(&self.dir)
        .check_success()
        .context("clone")?;
    }

    Command::new("find")
      .arg(&self.dir)
      .args(["-name", "*.pyc", "-delete"])
      .check_success()
      .context("delete pyc")?;
    Command::new("find")
      .arg(&self.dir)
      .args(["-name", "*.pyo", "-delete"])
      .check_success()
      .context("delete pyo")?;
    Command::new("find")
      .arg(&self.dir)
      .args(["-depth", "-empty", "-type", "d", "-exec", "rmdir", "{}", ";"])
      .check_success()
      .context("prune empty dirs")?;

    self.git().args(["clean", "-f", "-d", "-x"]).check_success().context("git clean")?;
    self.git().args(["checkout", "master"]).check_success().context("checkout master")?;
    self.git().args(["pull"]).check_success().context("pull")?;

    Ok(())
  }

  /// Installs the library into `env` at `origin/<branch>`. Removing any
  /// previously installed copy is allowed to fail.
  pub fn install(&self, env: &Environment, branch: &str) -> Result<()> {
    env.command("pip").args(["uninstall", "-y", &self.name]).allow_failure();
    Command::new("find")
      .arg(env.root())
      .args(["-name", &self.name, "-exec", "rm", "-rf", "{}", ";"])
      .allow_failure();

    self
      .git()
      .args(["checkout", &format!("origin/{branch}")])
      .check_success()
      .with_context(|| format!("checkout origin/{branch}"))?;

    let mut setup = env.command("python");
    setup.current_dir(&self.dir).args(["setup.py", "install"]);
    setup.check_success().context("setup.py install")
  }

  /// Short changeset hash of the current checkout, stamped into every
  /// result row.
  pub fn changeset(&self) -> Result<String> {
    let stdout = self
      .git()
      .args(["log", "-1", "--pretty=%h"])
      .status_stdout()
      .context("git log")?;

    Ok(stdout.trim().to_string())
  }

  fn git(&self) -> Command {
    let mut git = Command::new("git");
    git.current_dir(&self.dir);

    git
  }
}
