use std::{
  fs,
  os::unix::fs::symlink,
  path::PathBuf,
  process::Command,
};

use anyhow::{Context, Result};

use crate::{
  config::Config,
  env::Environment,
  ext::CommandExt,
};

const PYPY_DOWNLOADS: &str = "https://downloads.python.org/pypy";
const CPYTHON_DOWNLOADS: &str = "https://www.python.org/ftp/python";
const VIRTUALENV_URL: &str = "https://github.com/pypa/virtualenv.git";
const NUMPY_URL: &str = "https://github.com/numpy/numpy.git";
const PYPY_NUMPY_URL: &str = "https://bitbucket.org/pypy/numpy.git";

/// Downloads, builds and installs interpreter distributions, then creates
/// an isolated environment with the library dependencies for each.
pub struct Provisioner<'a> {
  config: &'a Config,
}

impl<'a> Provisioner<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self { config }
  }

  /// Installs the distribution named by `version` (`pypy-<ver>` or a bare
  /// CPython version), creates its virtualenv and installs numpy into it.
  /// Any failure aborts the invocation.
  pub fn install_dist(&self, version: &str) -> Result<()> {
    fs::create_dir_all(self.config.software_src_dir()).context("create software/src")?;

    match version.strip_prefix("pypy-") {
      Some(pypy_version) => self.install_pypy(pypy_version).context("install pypy")?,
      None => self.install_cpython(version).context("install cpython")?,
    }

    self.install_virtualenv(version).context("install virtualenv")?;
    self.install_numpy(version).context("install numpy")?;

    Ok(())
  }

  /// Downloads `link` into `software/src`, returning the download dir.
  fn grab(&self, link: &str) -> Result<PathBuf> {
    let src = self.config.software_src_dir();

    Command::new("wget")
      .arg(link)
      .current_dir(&src)
      .check_success()
      .with_context(|| format!("download {link}"))?;

    Ok(src)
  }

  fn install_pypy(&self, version: &str) -> Result<()> {
    let filename = format!("pypy-{version}-linux64.tar.bz2");
    let src = self.grab(&format!("{PYPY_DOWNLOADS}/{filename}"))?;

    let pypy_dir = self.config.software_dir().join("pypy");
    fs::create_dir_all(&pypy_dir).context("create pypy dir")?;

    Command::new("tar")
      .arg("xf")
      .arg(src.join(&filename))
      .current_dir(&pypy_dir)
      .check_success()
      .context("untar")?;

    // The tarball unpacks as pypy-<ver>-linux64; keep just the version.
    let prefix = format!("pypy-{version}");
    let unpacked = fs::read_dir(&pypy_dir)
      .context("read pypy dir")?
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .find(|path| {
        path
          .file_name()
          .map_or(false, |name| name.to_string_lossy().starts_with(&prefix))
      })
      .with_context(|| format!("no unpacked {prefix}* directory"))?;

    fs::rename(unpacked, pypy_dir.join(version)).context("rename unpacked dir")?;

    Ok(())
  }

  fn install_cpython(&self, version: &str) -> Result<()> {
    let number = release_number(version)?;
    let filename = format!("Python-{version}.tar.xz");
    let src = self.grab(&format!("{CPYTHON_DOWNLOADS}/{number}/{filename}"))?;

    Command::new("tar")
      .arg("xf")
      .arg(&filename)
      .current_dir(&src)
      .check_success()
      .context("untar")?;

    let build_dir = src.join(format!("Python-{version}"));
    let prefix = self.config.software_dir().join("python").join(version);

    Command::new("./configure")
      .arg(format!("--prefix={}", prefix.display()))
      .current_dir(&build_dir)
      .check_success()
      .context("configure")?;
    Command::new("make").arg("-j8").current_dir(&build_dir).check_success().context("make")?;
    Command::new("make")
      .arg("altinstall")
      .current_dir(&build_dir)
      .check_success()
      .context("make altinstall")?;

    Ok(())
  }

  /// Creates `venv/<version>` with the freshly installed interpreter,
  /// cloning the virtualenv script on first use.
  fn install_virtualenv(&self, version: &str) -> Result<()> {
    let src = self.config.software_src_dir();

    if !src.join("virtualenv").exists() {
      Command::new("git")
        .args(["clone", VIRTUALENV_URL])
        .current_dir(&src)
        .check_success()
        .context("clone virtualenv")?;
      symlink("virtualenv/virtualenv.py", src.join("virtualenv.py")).context("symlink virtualenv.py")?;
    }

    let interpreter = match version.strip_prefix("pypy-") {
      Some(pypy_version) => self
        .config
        .software_dir()
        .join("pypy")
        .join(pypy_version)
        .join("bin/pypy"),
      None => {
        let number = release_number(version)?;
        let minor: Vec<&str> = number.split('.').take(2).collect();

        self
          .config
          .software_dir()
          .join("python")
          .join(version)
          .join("bin")
          .join(format!("python{}", minor.join(".")))
      }
    };

    Command::new(interpreter)
      .arg(src.join("virtualenv.py"))
      .arg(self.config.venv_dir().join(version))
      .check_success()
      .context("create venv")?;

    Ok(())
  }

  fn install_numpy(&self, version: &str) -> Result<()> {
    let url = if version.starts_with("pypy-") { PYPY_NUMPY_URL } else { NUMPY_URL };

    let env = Environment::new(&self.config.venv_dir(), version);
    env
      .command("pip")
      .args(["install", "-e", &format!("git+{url}#egg=numpy")])
      .check_success()
      .context("pip install numpy")
  }
}

/// Extracts the leading `X.Y.Z` release number from a CPython version
/// string such as `3.4.1` or `3.4.0rc1`.
fn release_number(version: &str) -> Result<String> {
  let run: String = version
    .chars()
    .take_while(|c| c.is_ascii_digit() || *c == '.')
    .collect();
  let parts: Vec<&str> = run.split('.').collect();

  if parts.len() < 3
    || parts
      .iter()
      .take(3)
      .any(|part| part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()))
  {
    anyhow::bail!("bad version number for CPython: {version:?}");
  }

  Ok(parts[..3].join("."))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn release_number_accepts_plain_versions() {
    assert_eq!(release_number("2.7.8").unwrap(), "2.7.8");
    assert_eq!(release_number("3.10.2").unwrap(), "3.10.2");
  }

  #[test]
  fn release_number_strips_prerelease_suffixes() {
    assert_eq!(release_number("3.4.0rc1").unwrap(), "3.4.0");
    assert_eq!(release_number("3.4.0b1").unwrap(), "3.4.0");
  }

  #[test]
  fn release_number_rejects_incomplete_versions() {
    assert!(release_number("3.4").is_err());
    assert!(release_number("pypy").is_err());
    assert!(release_number("").is_err());
  }
}
