use std::{
  io::Write,
  process::{Command, ExitStatus},
};

use anyhow::{Context, Result};

#[extend::ext]
pub impl ExitStatus {
  fn check_success(&self) -> Result<()> {
    if !self.success() {
      anyhow::bail!("exited with non-zero status {self}");
    }

    Ok(())
  }
}

#[extend::ext]
pub impl Command {
  /// Runs the command, returning an error if the exit status was non-zero.
  fn check_success(&mut self) -> Result<()> {
    self.status().context("status")?.check_success()
  }

  /// Runs the command, capturing only stdout, returning an error on
  /// non-zero exit.
  fn status_stdout(&mut self) -> Result<String> {
    let output = self.output().context("output")?;
    output.status.check_success()?;

    std::io::stderr().write_all(&output.stderr).context("write")?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  /// Runs the command for its side effects only; a failure is reported on
  /// stderr and otherwise ignored.
  fn allow_failure(&mut self) {
    match self.status() {
      Ok(status) if !status.success() => eprintln!("ignoring failure: {status}"),
      Err(err) => eprintln!("ignoring failure: {err}"),
      _ => {}
    }
  }
}
