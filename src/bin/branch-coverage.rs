use branch_coverage::{OutOfRangePolicy, ScanOutcome, Scanner};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tally branch markers from trace output into a coverage report.", long_about = None)]
struct Args {
    /// Read trace lines from this file instead of standard input
    file: Option<PathBuf>,

    /// Fail on branch identifiers outside 1..=18 instead of skipping them
    #[arg(short, long)]
    strict: bool,

    /// Write diagnostic logs to stderr at this level
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn initialize_log(level: Option<LogLevel>) {
    if let Some(level) = level {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::from(level))
            .with_writer(io::stderr)
            .with_ansi(false)
            .init();
    }
}

fn scan(args: &Args, scanner: Scanner) -> branch_coverage::Result<ScanOutcome> {
    match &args.file {
        Some(path) => {
            let file = File::open(path).unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open trace file '{}': {}",
                    path.display(),
                    e
                );
                process::exit(1);
            });
            scanner.scan(file)
        }
        None => scanner.scan(io::stdin().lock()),
    }
}

fn main() {
    let args = Args::parse();
    initialize_log(args.log_level);

    let policy = if args.strict {
        OutOfRangePolicy::Reject
    } else {
        OutOfRangePolicy::Ignore
    };

    let outcome = match scan(&args, Scanner::new().policy(policy)) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = branch_coverage::to_writer(&outcome.table, &mut stdout)
        .and_then(|()| stdout.flush().map_err(Into::into))
    {
        eprintln!("Error: Failed to write report: {e}");
        process::exit(1);
    }
}
