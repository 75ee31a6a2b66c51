use std::{
  collections::{BTreeMap, BTreeSet},
  fmt::{self, Write},
  fs,
  io::ErrorKind,
  path::Path,
};

use anyhow::{Context, Result};

use crate::{config::Config, env::Environment};

/// Header of a sweep's `last_results.csv`.
pub const SWEEP_HEADER: &str = "Example,Date,Changeset,Execution Time,Error?";

/// Header of every combined cross-environment csv.
pub const COMBINED_HEADER: &str = "Interpreter,Date,Changeset,Execution Time,Error?";

/// A runnable example program, named `<group>/<name>` in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExampleId {
  pub group: String,
  pub name: String,
}

impl ExampleId {
  /// Parses one manifest line. A line without a `/` separator is fatal.
  pub fn parse(line: &str) -> Result<Self> {
    let (group, name) = line
      .split_once('/')
      .with_context(|| format!("malformed example id {line:?}"))?;

    Ok(Self {
      group: group.to_string(),
      name: name.to_string(),
    })
  }
}

impl fmt::Display for ExampleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.group, self.name)
  }
}

/// Summary of one example over one sweep, stamped with the run date and the
/// library changeset. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ExampleResult {
  pub example: ExampleId,
  pub date: String,
  pub changeset: String,
  /// Accumulated attempt time divided by the configured repeat count.
  pub average: f64,
  pub failed: bool,
}

impl ExampleResult {
  /// Row appended to the example's per-environment history csv.
  pub fn history_row(&self) -> String {
    format!("{},{},{},{}", self.date, self.changeset, self.average, u8::from(self.failed))
  }

  /// Row written to `last_results.csv`, including the example id.
  pub fn sweep_row(&self) -> String {
    format!("{},{}", self.example, self.history_row())
  }
}

/// One row of the combined view: an environment's result for one example.
#[derive(Debug, Clone)]
pub struct CombinedRow {
  pub environment: String,
  pub result: ExampleResult,
}

impl CombinedRow {
  fn csv_row(&self) -> String {
    format!("{},{}", self.environment, self.result.history_row())
  }
}

/// Folds per-environment sweep results into the cross-environment view and
/// the interpreter metadata file.
#[derive(Debug, Default)]
pub struct Combined {
  /// example id → one row per environment, in sweep order.
  pub examples: BTreeMap<ExampleId, Vec<CombinedRow>>,
  /// environment id → display label.
  pub labels: BTreeMap<String, String>,
}

impl Combined {
  /// Records one environment's sweep results.
  pub fn absorb(&mut self, env: &Environment, results: &[ExampleResult]) {
    for result in results {
      self.examples.entry(result.example.clone()).or_default().push(CombinedRow {
        environment: env.id.clone(),
        result: result.clone(),
      });
    }

    self.labels.insert(env.id.clone(), env.label());
  }

  /// Writes the environment-label map as a script-embedded assignment for
  /// the results page.
  pub fn write_interpreters_js(&self, path: &Path) -> Result<()> {
    let json = serde_json::to_string(&self.labels).context("serialize labels")?;

    fs::write(path, format!("var interpreter = {json}")).with_context(|| format!("write {path:?}"))
  }

  /// Rebuilds the combined directory for `branch` from scratch: the old
  /// tree is deleted, then one csv per example is written under its group.
  pub fn write_combined(&self, config: &Config, branch: &str) -> Result<()> {
    let all_dir = config.combined_dir(branch);
    if let Err(err) = fs::remove_dir_all(&all_dir) {
      if err.kind() != ErrorKind::NotFound {
        return Err(err).with_context(|| format!("remove {all_dir:?}"));
      }
    }

    let mut created = BTreeSet::new();
    for (example, rows) in &self.examples {
      let group_dir = all_dir.join(&example.group);
      if created.insert(example.group.clone()) {
        fs::create_dir_all(&group_dir).with_context(|| format!("create {group_dir:?}"))?;
      }

      let mut csv = String::new();
      writeln!(csv, "{COMBINED_HEADER}").context("header")?;
      for row in rows {
        writeln!(csv, "{}", row.csv_row()).context("row")?;
      }

      fs::write(group_dir.join(format!("{}.csv", example.name)), csv)
        .with_context(|| format!("write {example} csv"))?;
    }

    Ok(())
  }
}
