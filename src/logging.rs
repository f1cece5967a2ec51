//! Logging utilities for oolong applications.
//!
//! A running program owns the terminal: anything printed to stdout or
//! stderr lands in the middle of a rendered frame. Diagnostics therefore
//! go to a file. [`log_to_file`] installs a small file-backed `log`
//! backend so `log::debug!` and friends — from the model, from command
//! workers, from anywhere in the process — end up in a session log
//! instead of on the screen.

use std::path::Path;

use crate::Error;

#[cfg(feature = "logging")]
struct FileLogger {
    file: parking_lot::Mutex<std::fs::File>,
    prefix: String,
}

#[cfg(feature = "logging")]
impl log::Log for FileLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        use std::io::Write;
        use std::time::{SystemTime, UNIX_EPOCH};

        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut file = self.file.lock();
        // A dropped log line beats unwinding into the event loop.
        let _ = writeln!(
            file,
            "{prefix} {secs}.{millis:03} [{level}] {target}: {args}",
            prefix = self.prefix,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            level = record.level(),
            target = record.target(),
            args = record.args(),
        );
    }

    fn flush(&self) {
        use std::io::Write;
        let _ = self.file.lock().flush();
    }
}

/// Route `log` output to a session file.
///
/// Opens (or creates) `path` in append mode and installs a logger that
/// stamps every record with `prefix`, a timestamp, and the record's level
/// and target. Call it once, before the program runs; a process can only
/// install one logger, so a second call reports a configuration error.
///
/// # Example
///
/// ```rust,no_run
/// oolong::log_to_file("debug.log", "session")?;
/// log::info!("starting up");
/// # Ok::<(), oolong::Error>(())
/// ```
#[cfg(feature = "logging")]
pub fn log_to_file(path: impl AsRef<Path>, prefix: &str) -> Result<(), Error> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .map_err(Error::Io)?;

    let logger = FileLogger {
        file: parking_lot::Mutex::new(file),
        prefix: prefix.to_string(),
    };
    log::set_boxed_logger(Box::new(logger))
        .map_err(|err| Error::Configuration(format!("logger already installed: {err}")))?;
    log::set_max_level(log::LevelFilter::Debug);
    Ok(())
}

/// Stub that reports the `logging` feature as disabled.
#[cfg(not(feature = "logging"))]
pub fn log_to_file(_path: impl AsRef<Path>, _prefix: &str) -> Result<(), Error> {
    Err(Error::Configuration(
        "oolong was built without the `logging` feature".to_string(),
    ))
}

#[cfg(all(test, feature = "logging"))]
mod tests {
    use super::*;

    #[test]
    fn session_log_lines_carry_the_prefix() {
        let path = std::env::temp_dir().join(format!("oolong-log-{}.log", std::process::id()));
        log_to_file(&path, "session-1").expect("logger installed");
        log::warn!(target: "loop", "reader stalled");
        log::logger().flush();

        let contents = std::fs::read_to_string(&path).expect("log file");
        assert!(contents.contains("session-1"));
        assert!(contents.contains("[WARN] loop: reader stalled"));
        let _ = std::fs::remove_file(&path);
    }
}
