//! Leveled diagnostics for the TL runtime.
//!
//! Records are written to stderr as `[TL <LEVEL>] <module>: <message>`, so
//! they never interleave with values a host prints on stdout. The level is
//! global and atomic; the macros check it before formatting anything.
//!
//! # Example
//!
//! ```
//! use tl_log::{debug, warn, Level};
//!
//! tl_log::set_level(Level::Debug);
//!
//! let depth = 3;
//! debug!("open lists: {}", depth);
//! warn!("stack is {}% full", 90);
//! ```
//!
//! The level can also come from the environment:
//!
//! ```no_run
//! // TL_LOG=trace ./host
//! tl_log::init_from_env().ok();
//! ```

use std::fmt::Arguments;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Environment variable consulted by [`init_from_env`].
pub const LEVEL_ENV: &str = "TL_LOG";

/// Severity of a record. Smaller is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// A runtime operation failed.
    Error = 0,
    /// Something suspicious that did not fail the operation.
    Warn = 1,
    /// Lifecycle events (runtime created, destroyed).
    Info = 2,
    /// Failure details: grammar violations, refused allocations.
    Debug = 3,
    /// Per-operation chatter: every push and pop.
    Trace = 4,
}

impl Level {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }

    const fn color(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[90m",
        }
    }

    /// Upper-case name used in the record prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }
}

/// Returned when a level name is not one of the five known names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl std::fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown log level '{}'", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Process-wide filter state.
pub struct Logger {
    level: AtomicU8,
    color: AtomicBool,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
            color: AtomicBool::new(true),
        }
    }

    /// Changes the most verbose level that is still written.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Current most verbose level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Whether a record at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }

    /// Turns ANSI colouring of the prefix on or off.
    pub fn set_color(&self, on: bool) {
        self.color.store(on, Ordering::Relaxed);
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// The global logger; starts at [`Level::Warn`] so a quiet host stays quiet.
pub fn logger() -> &'static Logger {
    LOGGER.get_or_init(|| {
        let logger = Logger::new(Level::Warn);
        if std::env::var_os("NO_COLOR").is_some() {
            logger.set_color(false);
        }
        logger
    })
}

/// Sets the global level.
pub fn set_level(level: Level) {
    logger().set_level(level);
}

/// Sets the global level from a name such as `"debug"`.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the name is unknown; the level is unchanged.
pub fn set_level_from_str(name: &str) -> Result<(), ParseLevelError> {
    set_level(name.parse()?);
    Ok(())
}

/// Applies `TL_LOG` if it is set. An unset variable is not an error.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the variable holds an unknown level.
pub fn init_from_env() -> Result<(), ParseLevelError> {
    match std::env::var(LEVEL_ENV) {
        Ok(value) => set_level_from_str(&value),
        Err(_) => Ok(()),
    }
}

fn format_record(level: Level, target: &str, args: Arguments, color: bool) -> String {
    if color {
        format!("{}[TL {}]\x1b[0m {target}: {args}", level.color(), level.as_str())
    } else {
        format!("[TL {}] {target}: {args}", level.as_str())
    }
}

#[doc(hidden)]
pub fn __write(level: Level, target: &str, args: Arguments) {
    let logger = logger();
    if !logger.enabled(level) {
        return;
    }
    let color = logger.color.load(Ordering::Relaxed);
    eprintln!("{}", format_record(level, target, args, color));
}

/// Writes a record at an explicit level.
///
/// ```
/// tl_log::log!(level: tl_log::Level::Info, "runtime ready ({} slots)", 256);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {{
        let level = $level;
        if $crate::logger().enabled(level) {
            $crate::__write(level, module_path!(), format_args!($($arg)*));
        }
    }};
}

/// Writes an [`Level::Error`] record.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Error, $($arg)*) };
}

/// Writes a [`Level::Warn`] record.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Warn, $($arg)*) };
}

/// Writes an [`Level::Info`] record.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Info, $($arg)*) };
}

/// Writes a [`Level::Debug`] record.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Debug, $($arg)*) };
}

/// Writes a [`Level::Trace`] record.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("debug".parse::<Level>(), Ok(Level::Debug));
        assert_eq!(" TRACE ".parse::<Level>(), Ok(Level::Trace));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn test_filtering() {
        let logger = Logger::new(Level::Warn);
        assert!(logger.enabled(Level::Error));
        assert!(!logger.enabled(Level::Info));
        logger.set_level(Level::Trace);
        assert!(logger.enabled(Level::Trace));
        assert_eq!(logger.level(), Level::Trace);
    }

    #[test]
    fn test_bad_name_keeps_level() {
        let logger = Logger::new(Level::Info);
        let before = logger.level();
        assert!("nope".parse::<Level>().is_err());
        assert_eq!(logger.level(), before);
    }

    #[test]
    fn test_record_format() {
        let plain = format_record(Level::Debug, "tl::reader", format_args!("depth {}", 2), false);
        assert_eq!(plain, "[TL DEBUG] tl::reader: depth 2");

        let colored = format_record(Level::Error, "tl", format_args!("x"), true);
        assert!(colored.starts_with("\x1b[31m[TL ERROR]"));
    }

    #[test]
    fn test_macros_expand() {
        set_level(Level::Error);
        debug!("filtered {}", 1);
        error!("written {}", 2);
        set_level(Level::Warn);
    }
}
