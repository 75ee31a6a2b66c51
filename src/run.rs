use std::{
  process::Command,
  time::{Duration, Instant},
};

use anyhow::{Context, Result};

/// Outcome of one timed attempt at an external program. A non-zero exit
/// status is data here, not an error; only spawn and capture failures
/// propagate.
#[derive(Debug)]
pub struct Attempt {
  pub duration: Duration,
  pub success: bool,
  pub stdout: String,
  pub stderr: String,
}

/// Summary of the repeat loop over a single example program.
#[derive(Debug)]
pub struct RunSummary {
  /// Accumulated attempt time divided by the configured repeat count.
  pub average: f64,
  /// Whether the final attempt exited non-zero.
  pub failed: bool,
  /// Captured output of the final attempt, used for the log file.
  pub last: Attempt,
}

/// Runs `cmd` once with output captured, measuring wall-clock duration
/// around the blocking call.
pub fn timed(cmd: &mut Command) -> Result<Attempt> {
  let start = Instant::now();
  let output = cmd.output().context("output")?;
  let duration = start.elapsed();

  Ok(Attempt {
    duration,
    success: output.status.success(),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  })
}

/// Runs `attempt` up to `repeat` times, stopping early on the first
/// non-zero exit.
///
/// An attempt's duration is added to the running total before its exit
/// status is inspected, and the average always divides by `repeat`: a run
/// that fails partway reports the time accumulated up to and including the
/// failing attempt, spread over the full repeat count.
pub fn repeat_timed<F>(repeat: u32, mut attempt: F) -> Result<RunSummary>
where
  F: FnMut() -> Result<Attempt>,
{
  let mut sum = Duration::ZERO;
  let mut last: Option<Attempt> = None;

  for _ in 0..repeat {
    let outcome = attempt()?;
    sum += outcome.duration;

    let success = outcome.success;
    last = Some(outcome);
    if !success {
      break;
    }
  }

  let last = last.context("repeat count must be at least one")?;

  Ok(RunSummary {
    average: sum.as_secs_f64() / f64::from(repeat),
    failed: !last.success,
    last,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn attempt(secs: f64, success: bool) -> Attempt {
    Attempt {
      duration: Duration::from_secs_f64(secs),
      success,
      stdout: String::new(),
      stderr: String::new(),
    }
  }

  #[test]
  fn average_is_the_exact_mean_when_every_attempt_succeeds() {
    let mut durations = [1.0, 1.1, 0.9].into_iter();

    let summary = repeat_timed(3, || Ok(attempt(durations.next().unwrap(), true))).unwrap();

    assert!(!summary.failed);
    assert!((summary.average - 1.0).abs() < 1e-9);
  }

  #[test]
  fn failure_stops_the_loop_but_divides_by_the_configured_repeat() {
    let mut attempts = [attempt(1.0, true), attempt(0.5, false), attempt(9.0, true)].into_iter();
    let mut calls = 0;

    let summary = repeat_timed(3, || {
      calls += 1;
      Ok(attempts.next().unwrap())
    })
    .unwrap();

    assert_eq!(calls, 2);
    assert!(summary.failed);
    assert!((summary.average - 0.5).abs() < 1e-9);
  }

  #[test]
  fn failure_flag_reflects_only_the_final_attempt() {
    let mut attempts = [attempt(1.0, true), attempt(1.0, true)].into_iter();

    let summary = repeat_timed(2, || Ok(attempts.next().unwrap())).unwrap();

    assert!(!summary.failed);
    assert!((summary.average - 1.0).abs() < 1e-9);
  }

  #[test]
  fn timed_captures_output_and_exit_status() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo out; echo err >&2; exit 1"]);

    let outcome = timed(&mut cmd).unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stdout, "out\n");
    assert_eq!(outcome.stderr, "err\n");
  }

  #[test]
  fn timed_measures_wall_clock_duration() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "sleep 0.05"]);

    let outcome = timed(&mut cmd).unwrap();

    assert!(outcome.success);
    assert!(outcome.duration >= Duration::from_millis(40));
  }
}
