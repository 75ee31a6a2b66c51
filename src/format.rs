use std::{collections::BTreeMap, fmt::Write};

use anyhow::Result;

use crate::results::{Combined, ExampleResult};

const COLUMN_WIDTH: usize = 14;
const COLUMN_PADDING: &str = "  ";

fn format_header<'a, I: IntoIterator<Item = &'a str>>(columns: I) -> String {
  let header = columns
    .into_iter()
    .map(|col| format!("{col:<COLUMN_WIDTH$}"))
    .collect::<Vec<_>>()
    .join(COLUMN_PADDING);

  format!("{header}\n{}", "=".repeat(header.len()))
}

fn time_cell(average: f64, failed: bool) -> String {
  if failed {
    "error".to_string()
  } else {
    format!("{average:.3}s")
  }
}

/// Renders one sweep's results as an aligned console table.
pub fn sweep_table(results: &[ExampleResult]) -> Result<String> {
  let mut table = String::new();

  writeln!(table, "{}", format_header(["example", "time"]))?;
  for result in results {
    let example = format!("{:<COLUMN_WIDTH$}", result.example.to_string());
    let cell = format!("{:>COLUMN_WIDTH$}", time_cell(result.average, result.failed));
    writeln!(table, "{example}{COLUMN_PADDING}{cell}")?;
  }

  Ok(table)
}

/// Renders the cross-environment view: one row per example, one timing
/// column per environment.
pub fn combined_table(combined: &Combined) -> Result<String> {
  let envs: Vec<&str> = combined.labels.keys().map(String::as_str).collect();

  let mut table = String::new();
  writeln!(
    table,
    "{}",
    format_header(std::iter::once("example").chain(envs.iter().copied()))
  )?;

  for (example, rows) in &combined.examples {
    let by_env: BTreeMap<&str, String> = rows
      .iter()
      .map(|row| (row.environment.as_str(), time_cell(row.result.average, row.result.failed)))
      .collect();

    let row = std::iter::once(format!("{:<COLUMN_WIDTH$}", example.to_string()))
      .chain(envs.iter().map(|env| {
        let cell = by_env.get(env).map(String::as_str).unwrap_or("-");
        format!("{cell:>COLUMN_WIDTH$}")
      }))
      .collect::<Vec<_>>()
      .join(COLUMN_PADDING);

    writeln!(table, "{row}")?;
  }

  Ok(table)
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;
  use crate::{env::Environment, results::ExampleId};

  fn result(example: &str, average: f64, failed: bool) -> ExampleResult {
    ExampleResult {
      example: ExampleId::parse(example).unwrap(),
      date: "2014-06-01".to_string(),
      changeset: "abc1234".to_string(),
      average,
      failed,
    }
  }

  #[test]
  fn sweep_table_lists_every_example() {
    let table =
      sweep_table(&[result("ga/onemax", 1.0, false), result("gp/symbreg", 2.1, true)]).unwrap();

    assert!(table.contains("example"));
    assert!(table.contains("ga/onemax"));
    assert!(table.contains("1.000s"));
    assert!(table.contains("error"));
  }

  #[test]
  fn combined_table_has_one_column_per_environment() {
    let venv_dir = Path::new("/srv/timeit/venv");
    let mut combined = Combined::default();
    combined.absorb(&Environment::new(venv_dir, "2.7.8"), &[result("ga/onemax", 1.0, false)]);
    combined.absorb(
      &Environment::new(venv_dir, "pypy-2.3.1"),
      &[result("ga/onemax", 0.4, false)],
    );

    let table = combined_table(&combined).unwrap();
    let header = table.lines().next().unwrap();

    assert!(header.contains("2.7.8"));
    assert!(header.contains("pypy-2.3.1"));
    assert!(table.contains("0.400s"));
  }
}
