use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "dayboard";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;

/// Log files live next to the task lists and settings in the data directory.
pub fn log_directory(data_dir: &Path) -> &Path {
    data_dir
}

/// Picks the logger spec: `DAYBOARD_LOG`, then `RUST_LOG`, then the build default.
pub fn log_spec(dayboard_log: Option<String>, rust_log: Option<String>) -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,dayboard_lib=debug,dayboard=debug"
    } else {
        "warn,dayboard_lib=info,dayboard=info"
    };
    dayboard_log
        .filter(|value| !value.trim().is_empty())
        .or_else(|| rust_log.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_spec.to_string())
}

#[cfg(all(feature = "app", not(test)))]
pub fn init_logging(
    data_dir: &Path,
) -> Result<flexi_logger::LoggerHandle, flexi_logger::FlexiLoggerError> {
    use flexi_logger::{detailed_format, Cleanup, Criterion, FileSpec, Logger, Naming, WriteMode};

    std::fs::create_dir_all(data_dir)?;

    let spec = log_spec(
        std::env::var("DAYBOARD_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    );

    // Terminal output belongs to the board itself; logs only go to files.
    let handle = Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_directory(data_dir))
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        log_directory(data_dir).display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(handle)
}

/// One-line description of a panic: thread, location and message.
pub fn panic_summary(
    payload: &(dyn std::any::Any + Send),
    thread: Option<&str>,
    location: Option<String>,
) -> String {
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "<non-string panic payload>"
    };
    format!(
        "thread '{}' panicked at {}: {message}",
        thread.unwrap_or("<unnamed>"),
        location.as_deref().unwrap_or("<unknown>")
    )
}

/// Routes panics into the log file; the terminal still gets the default report.
#[cfg(all(feature = "app", not(test)))]
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let summary = panic_summary(
            info.payload(),
            thread.name(),
            info.location().map(|loc| loc.to_string()),
        );
        // Honours RUST_BACKTRACE instead of always paying for a capture.
        let backtrace = std::backtrace::Backtrace::capture();
        match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => {
                log::error!("{summary}\n{backtrace}");
            }
            _ => log::error!("{summary}"),
        }
        // Buffered writes would be lost if the process aborts.
        log::logger().flush();
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_spec_prefers_dayboard_log_then_rust_log() {
        assert_eq!(
            log_spec(Some("trace".to_string()), Some("error".to_string())),
            "trace"
        );
        assert_eq!(log_spec(Some("  ".to_string()), Some("error".to_string())), "error");
        assert!(log_spec(None, None).starts_with("warn,dayboard_lib="));
    }

    #[test]
    fn panic_summary_reads_str_and_string_payloads() {
        let location = Some("src/state.rs:10:5".to_string());
        let summary = panic_summary(&"list missing", Some("main"), location);
        assert_eq!(summary, "thread 'main' panicked at src/state.rs:10:5: list missing");

        let owned: Box<dyn std::any::Any + Send> = Box::new(format!("bad id {}", 7));
        let summary = panic_summary(owned.as_ref(), None, None);
        assert_eq!(summary, "thread '<unnamed>' panicked at <unknown>: bad id 7");

        let summary = panic_summary(&42_u32, Some("fetch"), None);
        assert!(summary.ends_with("<non-string panic payload>"));
    }

    #[test]
    fn logs_share_the_data_directory() {
        let dir = Path::new("/tmp/dayboard");
        assert_eq!(log_directory(dir), dir);
    }
}
