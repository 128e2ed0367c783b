//! Browser console backend for the `log` facade
//!
//! Installed from the wasm start hook. Native builds never install it, so
//! hosts and tests can plug in whatever `log` implementation they like.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        write_console(record.level(), &format!("{}", record.args()));
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn write_console(level: Level, message: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let message = JsValue::from_str(message);
    match level {
        Level::Error => console::error_1(&message),
        Level::Warn => console::warn_1(&message),
        Level::Info => console::info_1(&message),
        Level::Debug | Level::Trace => console::debug_1(&message),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn write_console(level: Level, message: &str) {
    eprintln!("[{}] {}", level, message);
}

/// Install the console logger. Later calls only change the level.
pub fn init(level: LevelFilter) {
    // Fails when a logger is already set; keeping that one is fine
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

/// Parse a level name ("off", "error", "warn", "info", "debug", "trace")
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse().ok()
}
