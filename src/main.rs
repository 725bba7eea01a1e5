use std::io::{stdin, stdout, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use memvfs::binaries;
use memvfs::{MemoryBackend, StorageBackend, Vfs, VfsConfig, YamlBackend};

/// Interactive shell over an in-process virtual filesystem
#[derive(Debug, Parser)]
#[clap(name = "memvfs", version)]
struct Cli {
  /// YAML config (durability, owner, default modes)
  #[clap(short, long)]
  config: Option<PathBuf>,
  /// Snapshot file; without it the filesystem lives in memory only
  #[clap(short, long)]
  store: Option<PathBuf>,
}

pub fn main() -> ExitCode {
  // Logs go to stderr, respecting RUST_LOG
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();

  let config = match &cli.config {
    Some(path) => match VfsConfig::from_path(path) {
      Ok(config) => config,
      Err(err) => {
        error!(path = %path.display(), %err, "can't load config");
        return ExitCode::FAILURE;
      },
    },
    None => VfsConfig::default(),
  };

  let backend: Box<dyn StorageBackend> = match &cli.store {
    Some(path) => Box::new(YamlBackend::new(path)),
    None => Box::new(MemoryBackend::new()),
  };

  let mut vfs = match Vfs::bootstrap(backend, config) {
    Ok(vfs) => vfs,
    Err(err) => {
      error!(%err, "can't start filesystem");
      return ExitCode::FAILURE;
    },
  };

  let stdin = stdin();
  let mut lines = stdin.lock().lines();
  let mut stdout = stdout();

  loop {
    let cwd = vfs.current_path().unwrap_or_else(|_| String::from("?"));
    print!("{cwd} # ");
    if stdout.flush().is_err() {
      break;
    }

    let line = match lines.next() {
      Some(Ok(line)) => line,
      Some(Err(err)) => {
        error!(%err, "can't read input");
        break;
      },
      None => break,
    };

    match line.trim() {
      "exit" => break,
      line => {
        if let Err(err) = binaries::exec(line, &mut vfs, &mut stdout) {
          error!(%err, "can't write output");
          break;
        }
      },
    }
  }

  if vfs.has_pending_changes() {
    if let Err(err) = vfs.sync() {
      error!(%err, "final sync failed");
      return ExitCode::FAILURE;
    }
  }

  ExitCode::SUCCESS
}

// vim:ts=2 sw=2
