use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, MakeWriter},
    prelude::*,
};

/// Console level selected by `-v` repetitions; `-q` keeps errors only.
pub fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Console output filtered by the command-line flags, plus an optional log file.
///
/// The file is written at DEBUG or finer whatever the console shows, with thread ids
/// and the enclosing workflow and stage spans on every line, so a quiet run still
/// leaves a full record of each stage analysis.
fn build_subscriber<W>(
    console: W,
    console_level: LevelFilter,
    ansi: bool,
    log_file: Option<File>,
) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let console_layer = fmt::layer()
        .with_writer(console)
        .with_ansi(ansi)
        .with_target(false)
        .compact()
        .with_filter(console_level);

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true)
            .with_filter(console_level.max(LevelFilter::DEBUG))
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let file = log_file
        .map(File::create)
        .transpose()
        .map_err(CliError::Io)?;
    let subscriber = build_subscriber(
        std::io::stderr,
        console_level(verbosity, quiet),
        true,
        file,
    );
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {}", e)))
}
