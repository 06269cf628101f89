use parking_lot::Mutex;
/// Debug log file for agent-deck
///
/// Controlled by the AGENT_DECK_DEBUG environment variable:
/// - 0 or unset: No debugging
/// - 1: Errors only
/// - 2: Info level (lifecycle events, persistence)
/// - 3: Debug level (backend calls, recovery decisions)
/// - 4: Trace level (every output chunk and timer tick)
///
/// All output goes to /tmp/agent_deck_debug.log on Unix/macOS,
/// or %TEMP%\agent_deck_debug.log on Windows, so that terminal output is
/// never interleaved with log lines.
///
/// [`init_log_bridge`] routes `log` crate records into the same file.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Self {
        match std::env::var("AGENT_DECK_DEBUG") {
            Ok(val) => Self::from_number(val.trim()),
            Err(_) => DebugLevel::Off,
        }
    }

    fn from_number(val: &str) -> Self {
        match val.parse::<u8>() {
            Ok(1) => DebugLevel::Error,
            Ok(2) => DebugLevel::Info,
            Ok(3) => DebugLevel::Debug,
            Ok(4) => DebugLevel::Trace,
            _ => DebugLevel::Off,
        }
    }

    /// Debug level that lets `filter` through
    fn from_level_filter(filter: log::LevelFilter) -> Self {
        match filter {
            log::LevelFilter::Off => DebugLevel::Off,
            log::LevelFilter::Error | log::LevelFilter::Warn => DebugLevel::Error,
            log::LevelFilter::Info => DebugLevel::Info,
            log::LevelFilter::Debug => DebugLevel::Debug,
            log::LevelFilter::Trace => DebugLevel::Trace,
        }
    }

    fn from_log_level(level: log::Level) -> Self {
        match level {
            log::Level::Error | log::Level::Warn => DebugLevel::Error,
            log::Level::Info => DebugLevel::Info,
            log::Level::Debug => DebugLevel::Debug,
            log::Level::Trace => DebugLevel::Trace,
        }
    }
}

/// Path of the debug log file
pub fn log_path() -> PathBuf {
    #[cfg(unix)]
    let log_path = PathBuf::from("/tmp/agent_deck_debug.log");
    #[cfg(not(unix))]
    let log_path = std::env::temp_dir().join("agent_deck_debug.log");
    log_path
}

/// Global debug logger
struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
}

impl DebugLogger {
    fn new() -> Self {
        let mut logger = DebugLogger {
            level: DebugLevel::Off,
            file: None,
        };
        logger.set_level(DebugLevel::from_env());
        logger
    }

    /// Change the level, opening the log file the first time it is needed
    fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
        if level == DebugLevel::Off || self.file.is_some() {
            return;
        }
        // Silently stay file-less if the log can't be opened
        if let Ok(f) = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
        {
            self.file = Some(f);
            self.write_raw(&format!(
                "\n{}\nagent-deck debug session started at {} (level={:?})\n{}\n",
                "=".repeat(80),
                get_timestamp(),
                level,
                "=".repeat(80)
            ));
        }
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level <= self.level {
            let timestamp = get_timestamp();
            let level_str = match level {
                DebugLevel::Error => "ERROR",
                DebugLevel::Info => "INFO ",
                DebugLevel::Debug => "DEBUG",
                DebugLevel::Trace => "TRACE",
                DebugLevel::Off => return,
            };
            self.write_raw(&format!(
                "[{}] [{}] [{}] {}\n",
                timestamp, level_str, category, msg
            ));
        }
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new()))
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

/// `log` facade backend writing into the debug log file
struct LogBridge {
    stderr: bool,
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let category = record.module_path().unwrap_or_else(|| record.target());
        let level = DebugLevel::from_log_level(record.level());
        log(level, category, &record.args().to_string());
        if self.stderr {
            eprintln!("[{}] [{}] {}", record.level(), category, record.args());
        }
    }

    fn flush(&self) {}
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Route `log` records to the debug log file.
///
/// Precedence: `level` (command line), then `RUST_LOG`, then
/// `AGENT_DECK_DEBUG`. When `RUST_LOG` is set records are mirrored to
/// stderr. Calling this more than once only updates the level.
pub fn init_log_bridge(level: Option<log::LevelFilter>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = level
        .or_else(|| {
            rust_log
                .as_deref()
                .and_then(|v| v.trim().parse::<log::LevelFilter>().ok())
        })
        .unwrap_or_else(|| match get_logger().lock().level {
            DebugLevel::Off => log::LevelFilter::Off,
            DebugLevel::Error => log::LevelFilter::Warn,
            DebugLevel::Info => log::LevelFilter::Info,
            DebugLevel::Debug => log::LevelFilter::Debug,
            DebugLevel::Trace => log::LevelFilter::Trace,
        });

    set_level_filter(filter);

    let bridge = BRIDGE.get_or_init(|| LogBridge {
        stderr: rust_log.is_some(),
    });
    // Already installed on a repeated call
    let _ = log::set_logger(bridge);
}

/// Apply a new level to both the `log` facade and the debug file
pub fn set_level_filter(filter: log::LevelFilter) {
    log::set_max_level(filter);
    let mut logger = get_logger().lock();
    let level = DebugLevel::from_level_filter(filter);
    if level > logger.level || filter == log::LevelFilter::Off {
        logger.set_level(level);
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}
