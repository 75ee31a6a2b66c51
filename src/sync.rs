use std::process::Command;

use anyhow::{Context, Result};

use crate::{config::Config, ext::CommandExt};

/// Directory on the results host receiving data, logs and metadata.
pub const DEFAULT_REMOTE_ROOT: &str = "/services/timeit";

/// Copies result data, logs and the interpreter metadata file to `server`.
pub fn sync(config: &Config, server: &str, remote_root: &str) -> Result<()> {
  rsync(
    &format!("{}/", config.data_root().display()),
    &format!("{server}:{remote_root}/data/"),
  )
  .context("sync data")?;
  rsync(
    &format!("{}/", config.log_root().display()),
    &format!("{server}:{remote_root}/log/"),
  )
  .context("sync log")?;
  rsync(
    &config.interpreters_js().display().to_string(),
    &format!("{server}:{remote_root}/interpreters.js"),
  )
  .context("sync interpreters.js")?;

  Ok(())
}

fn rsync(source: &str, dest: &str) -> Result<()> {
  Command::new("rsync").arg("-avz").arg(source).arg(dest).check_success()
}
