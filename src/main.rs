//! pollmux - follow newly appended lines of every file under a set of roots.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pollmux::{CancellationToken, Config, LineBatch, Progress, Session, DEFAULT_MAX_OFFSET};

#[derive(Debug, Parser)]
#[command(
    name = "pollmux",
    about = "Follow new lines of files found under directories",
    version
)]
struct Cli {
    /// Files or directories to scan, comma separated or repeated.
    #[arg(
        short = 's',
        long,
        value_delimiter = ',',
        required = true,
        env = "POLLMUX_START_WITH"
    )]
    start_with: Vec<PathBuf>,

    /// Regular expressions matched against full file paths, paired with the
    /// start-with entries in the same order. Entries without one are not
    /// filtered.
    #[arg(short = 'r', long, value_delimiter = ',', env = "POLLMUX_REGEXPS")]
    regexps_to_watch: Vec<String>,

    /// Delay between scans, in milliseconds.
    #[arg(long, default_value_t = 600, env = "POLLMUX_DELAY")]
    delay: u64,

    /// Max offset from the end of a file for its first printing, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_OFFSET, env = "POLLMUX_MAX_OFFSET")]
    max_offset: u64,

    /// Prefix of the log file stored in the OS temp directory.
    #[arg(long, default_value = "pollmux.log", env = "POLLMUX_LOG_PREFIX")]
    log_prefix: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8, prefix: &str) -> io::Result<PathBuf> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let (file, path) = tempfile::Builder::new()
        .prefix(prefix)
        .tempfile()?
        .keep()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(filter)
        .init();

    Ok(path)
}

fn print_batch(batch: &LineBatch) {
    println!("=> {} <=", batch.source().display());
    for line in batch.iter() {
        println!("{}", line);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match init_tracing(cli.verbose, &cli.log_prefix) {
        Ok(path) => eprintln!("logs are in {}", path.display()),
        Err(e) => {
            eprintln!("could not create a log file: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let config = Config::new(cli.start_with)
        .with_patterns(cli.regexps_to_watch)
        .with_delay(Duration::from_millis(cli.delay))
        .with_max_offset(cli.max_offset);

    let (session, mut batches, mut progress) = match Session::new(config) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!(error = %e, "Could not start watching");
            eprintln!("could not start watching: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted");
                interrupt.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });

    let watch = tokio::spawn(session.watch(cancel));

    let mut progress_open = true;
    loop {
        tokio::select! {
            batch = batches.next_batch() => match batch {
                Some(batch) => print_batch(&batch),
                None => break,
            },
            notice = progress.next_progress(), if progress_open => match notice {
                Some(Progress::Updated(_)) if cli.verbose == 0 => {}
                Some(notice) => println!("{}", notice),
                None => progress_open = false,
            },
        }
    }

    match watch.await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("watch task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
