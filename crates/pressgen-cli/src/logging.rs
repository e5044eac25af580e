use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

use crate::CliError;

/// Logging knobs shared by every subcommand.
#[derive(Debug, Clone)]
pub struct LogSettings<'a> {
    /// Default filter; `RUST_LOG` takes precedence when set.
    pub level: &'a str,
    pub json: bool,
    pub file: Option<&'a Path>,
}

/// Install the global subscriber. Logs go to stderr unless a file is given,
/// so stdout stays free for command output.
pub fn init_logging(settings: &LogSettings<'_>) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.level))
        .map_err(|err| CliError::Logging(err.to_string()))?;

    let make_writer = match settings.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let file = Arc::new(Mutex::new(file));
            BoxMakeWriter::new(move || SharedWriter {
                file: Arc::clone(&file),
            })
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let layer = tracing_subscriber::fmt::layer().with_timer(UtcTime::rfc_3339());
    let result = if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json().with_writer(make_writer))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_ansi(settings.file.is_none()).with_writer(make_writer))
            .try_init()
    };
    result.map_err(|err| CliError::Logging(err.to_string()))
}

struct SharedWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("failed to lock log file"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("failed to lock log file"))?;
        file.flush()
    }
}
