use std::{
  collections::BTreeSet,
  fs,
  io::Write,
  process::Command,
};

use anyhow::{Context, Result};
use chrono::Local;

use crate::{
  config::Config,
  env::Environment,
  library::Library,
  results::{self, ExampleId, ExampleResult},
  run,
};

/// One benchmark sweep: every manifest example run `repeat` times inside a
/// single environment, against one branch of the library.
pub struct Bench<'a> {
  config: &'a Config,
  env: &'a Environment,
  branch: &'a str,
  repeat: u32,
}

impl<'a> Bench<'a> {
  pub fn new(config: &'a Config, env: &'a Environment, branch: &'a str, repeat: u32) -> Self {
    Self {
      config,
      env,
      branch,
      repeat,
    }
  }

  /// Stages the library at the requested branch, then runs the full sweep.
  pub fn benchmark(&self) -> Result<Vec<ExampleResult>> {
    let library = Library::new(self.config);
    library.clean_pull().context("clean pull")?;
    library.install(self.env, self.branch).context("install library")?;

    fs::create_dir_all(self.config.data_dir(self.branch, &self.env.id)).context("create data dir")?;
    fs::create_dir_all(self.config.log_dir(self.branch, &self.env.id)).context("create log dir")?;

    self.run_examples(&library).context("run examples")
  }

  fn run_examples(&self, library: &Library) -> Result<Vec<ExampleResult>> {
    let date = Local::now().format("%Y-%m-%d").to_string();
    let changeset = library.changeset().context("changeset")?;

    self.sweep(library, &date, &changeset)
  }

  /// Runs every manifest example in order. An example that exits non-zero
  /// is recorded and the sweep moves on; anything else is fatal.
  fn sweep(&self, library: &Library, date: &str, changeset: &str) -> Result<Vec<ExampleResult>> {
    let examples = self.manifest(library)?;

    let mut results = Vec::new();
    let mut created = BTreeSet::new();

    for example in examples {
      eprintln!("  running {example}");

      self.create_group_dirs(&example.group, &mut created)?;

      let summary = run::repeat_timed(self.repeat, || {
        run::timed(&mut self.example_command(library, &example))
      })
      .with_context(|| format!("run {example}"))?;

      let result = ExampleResult {
        example,
        date: date.to_string(),
        changeset: changeset.to_string(),
        average: summary.average,
        failed: summary.failed,
      };

      self.append_history(&result).with_context(|| format!("append history for {}", result.example))?;
      self.write_log(&result.example, &summary.last).with_context(|| format!("write log for {}", result.example))?;

      results.push(result);
    }

    self.write_last_results(&results).context("write last results")?;

    Ok(results)
  }

  fn manifest(&self, library: &Library) -> Result<Vec<ExampleId>> {
    let path = library.manifest_path();
    let manifest = fs::read_to_string(&path).with_context(|| format!("read manifest {path:?}"))?;

    manifest.lines().map(ExampleId::parse).collect()
  }

  fn example_command(&self, library: &Library, example: &ExampleId) -> Command {
    let mut cmd = self.env.command("python");
    cmd
      .arg(format!("{}.py", example.name))
      .current_dir(library.example_dir(&example.group));

    cmd
  }

  /// Ensures the group's data and log directories exist, once per group per
  /// sweep.
  fn create_group_dirs(&self, group: &str, created: &mut BTreeSet<String>) -> Result<()> {
    if !created.insert(group.to_string()) {
      return Ok(());
    }

    let data_dir = self.config.data_dir(self.branch, &self.env.id).join(group);
    fs::create_dir_all(&data_dir).with_context(|| format!("create {data_dir:?}"))?;

    let log_dir = self.config.log_dir(self.branch, &self.env.id).join(group);
    fs::create_dir_all(&log_dir).with_context(|| format!("create {log_dir:?}"))?;

    Ok(())
  }

  /// Appends one row to the example's history csv. History files only ever
  /// grow; the combined view is rebuilt elsewhere.
  fn append_history(&self, result: &ExampleResult) -> Result<()> {
    let path = self
      .config
      .data_dir(self.branch, &self.env.id)
      .join(&result.example.group)
      .join(format!("{}.csv", result.example.name));

    let mut file = fs::OpenOptions::new()
      .append(true)
      .create(true)
      .open(&path)
      .with_context(|| format!("open {path:?}"))?;
    writeln!(file, "{}", result.history_row()).context("append")?;

    Ok(())
  }

  /// Overwrites the example's log with the final attempt's output, stderr
  /// first when the attempt failed.
  fn write_log(&self, example: &ExampleId, last: &run::Attempt) -> Result<()> {
    let path = self
      .config
      .log_dir(self.branch, &self.env.id)
      .join(&example.group)
      .join(format!("{}.log", example.name));

    let mut contents = String::new();
    if !last.success {
      contents.push_str(&last.stderr);
    }
    contents.push_str(&last.stdout);

    fs::write(&path, contents).with_context(|| format!("write {path:?}"))
  }

  fn write_last_results(&self, results: &[ExampleResult]) -> Result<()> {
    let path = self.config.last_results(self.branch, &self.env.id);

    let mut csv = String::from(results::SWEEP_HEADER);
    csv.push('\n');
    for result in results {
      csv.push_str(&result.sweep_row());
      csv.push('\n');
    }

    fs::write(&path, csv).with_context(|| format!("write {path:?}"))
  }
}

#[cfg(test)]
mod tests {
  use std::{os::unix::fs::PermissionsExt, path::Path};

  use tempfile::TempDir;

  use super::*;
  use crate::config::{DEFAULT_LIBRARY_NAME, DEFAULT_LIBRARY_URL};

  /// Stand-in interpreter: fails on `broken.py`, echoes on anything else.
  fn write_python_stub(env_root: &Path) {
    let bin = env_root.join("bin");
    fs::create_dir_all(&bin).unwrap();

    let python = bin.join("python");
    fs::write(
      &python,
      "#!/bin/sh\ncase \"$1\" in\n  broken.py) echo boom >&2; exit 1 ;;\n  *) echo ok ;;\nesac\n",
    )
    .unwrap();

    let mut perms = fs::metadata(&python).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&python, perms).unwrap();
  }

  fn fixture(manifest: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let config = Config::new(
      dir.path().to_path_buf(),
      DEFAULT_LIBRARY_URL.to_string(),
      DEFAULT_LIBRARY_NAME.to_string(),
    );

    let examples = config.library_dir().join("examples");
    fs::create_dir_all(examples.join("ga")).unwrap();
    fs::create_dir_all(examples.join("gp")).unwrap();
    fs::write(examples.join("speed.txt"), manifest).unwrap();

    write_python_stub(&config.venv_dir().join("2.7.8"));

    (dir, config)
  }

  #[test]
  fn sweep_records_results_in_manifest_order() {
    let (_dir, config) = fixture("ga/onemax\ngp/symbreg\n");
    let env = Environment::new(&config.venv_dir(), "2.7.8");
    let library = Library::new(&config);

    let results = Bench::new(&config, &env, "master", 2)
      .sweep(&library, "2014-06-01", "abc1234")
      .unwrap();

    let ids: Vec<String> = results.iter().map(|result| result.example.to_string()).collect();
    assert_eq!(ids, ["ga/onemax", "gp/symbreg"]);
    assert!(results.iter().all(|result| !result.failed));
    assert!(results.iter().all(|result| result.average > 0.0));
  }

  #[test]
  fn history_rows_append_across_sweeps() {
    let (_dir, config) = fixture("ga/onemax\n");
    let env = Environment::new(&config.venv_dir(), "2.7.8");
    let library = Library::new(&config);
    let bench = Bench::new(&config, &env, "master", 1);

    bench.sweep(&library, "2014-06-01", "abc1234").unwrap();
    bench.sweep(&library, "2014-06-02", "def5678").unwrap();

    let history =
      fs::read_to_string(config.data_dir("master", &env.id).join("ga/onemax.csv")).unwrap();
    let lines: Vec<&str> = history.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("2014-06-01,abc1234,"));
    assert!(lines[1].starts_with("2014-06-02,def5678,"));
  }

  #[test]
  fn failing_example_is_recorded_and_does_not_abort_the_sweep() {
    let (_dir, config) = fixture("ga/broken\ngp/symbreg\n");
    let env = Environment::new(&config.venv_dir(), "2.7.8");
    let library = Library::new(&config);

    let results = Bench::new(&config, &env, "master", 3)
      .sweep(&library, "2014-06-01", "abc1234")
      .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].failed);
    assert!(!results[1].failed);

    let log = fs::read_to_string(config.log_dir("master", &env.id).join("ga/broken.log")).unwrap();
    assert_eq!(log, "boom\n");
  }

  #[test]
  fn logs_hold_the_final_attempt_stdout() {
    let (_dir, config) = fixture("gp/symbreg\n");
    let env = Environment::new(&config.venv_dir(), "2.7.8");
    let library = Library::new(&config);

    Bench::new(&config, &env, "master", 1)
      .sweep(&library, "2014-06-01", "abc1234")
      .unwrap();

    let log = fs::read_to_string(config.log_dir("master", &env.id).join("gp/symbreg.log")).unwrap();
    assert_eq!(log, "ok\n");
  }

  #[test]
  fn last_results_has_a_header_and_one_row_per_example() {
    let (_dir, config) = fixture("ga/onemax\ngp/symbreg\n");
    let env = Environment::new(&config.venv_dir(), "2.7.8");
    let library = Library::new(&config);

    Bench::new(&config, &env, "master", 1)
      .sweep(&library, "2014-06-01", "abc1234")
      .unwrap();

    let csv = fs::read_to_string(config.last_results("master", &env.id)).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], results::SWEEP_HEADER);
    assert!(lines[1].starts_with("ga/onemax,2014-06-01,abc1234,"));
    assert!(lines[2].starts_with("gp/symbreg,2014-06-01,abc1234,"));
  }

  #[test]
  fn malformed_manifest_lines_are_fatal() {
    let (_dir, config) = fixture("onemax\n");
    let env = Environment::new(&config.venv_dir(), "2.7.8");
    let library = Library::new(&config);

    let result = Bench::new(&config, &env, "master", 1).sweep(&library, "2014-06-01", "abc1234");

    assert!(result.is_err());
  }
}
