//! Logging setup

use color_eyre::eyre::{eyre, Result};
use std::fmt;
use std::fs::File;
use std::str::FromStr;
use std::time::SystemTime;
use tracing::info;
use tracing_subscriber::{
    filter::LevelFilter, fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Layer, Registry,
};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let total_seconds = SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;
        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Install a global `tracing` subscriber writing to `output_path` or stdout.
///
/// `level` is one of `off`, `error`, `warn`, `info`, `debug`, `trace`. A
/// second call leaves the first subscriber in place.
pub fn setup_output(level: &str, output_path: Option<&str>) -> Result<()> {
    let filter = LevelFilter::from_str(level).map_err(|e| eyre!("Invalid log level {}: {}", level, e))?;
    let installed = match output_path {
        Some(path) => {
            let log = File::create(path).map_err(|e| eyre!("Could not create output file {}: {}", path, e))?;
            let file_layer = layer()
                .with_writer(log)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(false)
                .with_filter(filter);
            Registry::default().with(file_layer).try_init().is_ok()
        }
        None => {
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true)
                .with_filter(filter);
            Registry::default().with(stdout_layer).try_init().is_ok()
        }
    };
    if installed {
        info!("Logging at level {} to {}", filter, output_path.unwrap_or("stdout"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_output_rejects_bad_level() {
        assert!(setup_output("loud", None).is_err());
    }

    #[test]
    fn test_setup_output_is_idempotent() {
        assert!(setup_output("warn", None).is_ok());
        assert!(setup_output("debug", None).is_ok());
    }
}
