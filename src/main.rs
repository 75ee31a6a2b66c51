mod bench;
mod config;
mod env;
mod ext;
mod format;
mod library;
mod provision;
mod results;
mod run;
mod sync;

use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use self::{
  bench::Bench,
  config::Config,
  env::Environment,
  provision::Provisioner,
  results::Combined,
};

#[derive(Parser)]
struct Args {
  /// Directory holding venv/, software/, data/ and log/.
  #[arg(long, default_value = ".")]
  base_dir: PathBuf,
  /// Git URL of the library under test.
  #[arg(long, default_value = config::DEFAULT_LIBRARY_URL)]
  library_url: String,
  /// Package name of the library under test.
  #[arg(long, default_value = config::DEFAULT_LIBRARY_NAME)]
  library_name: String,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Download and build an interpreter distribution, then provision an
  /// isolated environment for it.
  InstallDist {
    /// Distribution to install: `pypy-<ver>` or a CPython version.
    version: String,
  },
  /// Run one benchmark sweep for a provisioned environment.
  Bench {
    /// Environment to sweep, as named under venv/.
    version: String,
    /// Branch of the library to check out.
    branch: String,
    /// How many times to run each example.
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    repeat: u32,
  },
  /// Sweep every provisioned environment and rebuild the combined view.
  RunAll {
    /// Branch of the library to check out.
    branch: String,
    /// How many times to run each example.
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    repeat: u32,
  },
  /// Copy result data, logs and interpreter metadata to the results host.
  Sync {
    /// rsync destination host.
    server: String,
    /// Directory on the host receiving the files.
    #[arg(long, default_value = sync::DEFAULT_REMOTE_ROOT)]
    remote_root: String,
  },
}

fn main() -> Result<()> {
  let args = Args::parse();
  let config = Config::new(args.base_dir, args.library_url, args.library_name);

  match args.command {
    Command::InstallDist { version } => {
      Provisioner::new(&config).install_dist(&version).context("install dist")?;
    }
    Command::Bench { version, branch, repeat } => {
      let env = Environment::new(&config.venv_dir(), version);
      if !env.exists() {
        anyhow::bail!("environment {:?} is not provisioned", env.id);
      }

      let results = Bench::new(&config, &env, &branch, repeat).benchmark().context("benchmark")?;
      println!("{}", format::sweep_table(&results).context("format")?);
    }
    Command::RunAll { branch, repeat } => run_all(&config, &branch, repeat)?,
    Command::Sync { server, remote_root } => {
      sync::sync(&config, &server, &remote_root).context("sync")?;
    }
  }

  Ok(())
}

/// Sweeps every provisioned environment in sorted order, then rebuilds the
/// combined view and the interpreter metadata file.
fn run_all(config: &Config, branch: &str, repeat: u32) -> Result<()> {
  let start = Instant::now();

  let mut combined = Combined::default();
  for env in Environment::discover(&config.venv_dir()).context("discover environments")? {
    eprintln!("benchmarking {:?}", env.id);

    let results = Bench::new(config, &env, branch, repeat)
      .benchmark()
      .with_context(|| format!("benchmark {}", env.id))?;
    combined.absorb(&env, &results);
  }

  combined
    .write_interpreters_js(&config.interpreters_js())
    .context("write interpreters.js")?;
  combined.write_combined(config, branch).context("write combined view")?;

  println!("{}", format::combined_table(&combined).context("format")?);
  println!("Total elapsed time: {:.1}s", start.elapsed().as_secs_f64());

  Ok(())
}
