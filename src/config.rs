use std::path::PathBuf;

/// Default git URL of the library under test.
pub const DEFAULT_LIBRARY_URL: &str = "https://github.com/DEAP/deap.git";

/// Default package name of the library under test.
pub const DEFAULT_LIBRARY_NAME: &str = "deap";

/// Every path the tool touches, derived from one base directory.
///
/// Components receive this by reference; there is no ambient global state.
#[derive(Debug, Clone)]
pub struct Config {
  /// Directory holding `venv/`, `software/`, `data/`, `log/` and the
  /// library checkout.
  pub base_dir: PathBuf,
  /// Git URL of the library under test.
  pub library_url: String,
  /// Package name of the library under test, also its checkout directory.
  pub library_name: String,
}

impl Config {
  pub fn new(base_dir: PathBuf, library_url: String, library_name: String) -> Self {
    Self {
      base_dir,
      library_url,
      library_name,
    }
  }

  /// Parent directory of all provisioned environments.
  pub fn venv_dir(&self) -> PathBuf {
    self.base_dir.join("venv")
  }

  /// Where interpreter distributions are downloaded and built.
  pub fn software_dir(&self) -> PathBuf {
    self.base_dir.join("software")
  }

  pub fn software_src_dir(&self) -> PathBuf {
    self.software_dir().join("src")
  }

  /// Checkout of the library under test.
  pub fn library_dir(&self) -> PathBuf {
    self.base_dir.join(&self.library_name)
  }

  pub fn data_root(&self) -> PathBuf {
    self.base_dir.join("data")
  }

  pub fn log_root(&self) -> PathBuf {
    self.base_dir.join("log")
  }

  /// Per-environment result files for one branch.
  pub fn data_dir(&self, branch: &str, env_id: &str) -> PathBuf {
    self.data_root().join(branch).join(env_id)
  }

  /// Per-environment captured example output for one branch.
  pub fn log_dir(&self, branch: &str, env_id: &str) -> PathBuf {
    self.log_root().join(branch).join(env_id)
  }

  /// Combined cross-environment view, rebuilt from scratch on every full
  /// sweep.
  pub fn combined_dir(&self, branch: &str) -> PathBuf {
    self.data_root().join(branch).join("all")
  }

  pub fn last_results(&self, branch: &str, env_id: &str) -> PathBuf {
    self.data_dir(branch, env_id).join("last_results.csv")
  }

  /// Environment metadata consumed by the results page.
  pub fn interpreters_js(&self) -> PathBuf {
    self.base_dir.join("interpreters.js")
  }
}
