use evlog::Logger;
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<Logger> = OnceCell::new();
static FALLBACK: OnceCell<Logger> = OnceCell::new();

/// Installs the process-wide logger. Only the first call has any effect.
pub fn set_logger(logger: Logger) {
    let _ = LOGGER.set(logger);
}

/// The installed logger, or a logger with no printers when none was installed
/// (unit tests never install one).
pub fn get_logger() -> &'static Logger {
    match LOGGER.get() {
        Some(v) => v,
        None => FALLBACK.get_or_init(Logger::default),
    }
}
