//!
//! Logger bootstrap and logging macros.
//!
//! Crates of the workspace log through `lineage_core::{trace, debug, info, warn, error}`
//! so that the `log` facade stays an implementation detail of this crate.
//!

mod appender;
mod consts;
mod logger;

pub use consts::*;

#[doc(hidden)]
pub use ::log as facade;

use appender::AppenderSpec;
use log::LevelFilter;
use log4rs::config::{Config, Root};
use logger::LogFilters;
use std::{env, path::Path};
use thiserror::Error;

const CONSOLE_APPENDER: &str = "stdout";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("logger spec parsing error: {0}")]
    ParseLoggerSpec(String),

    #[error("appender setup error: {0}")]
    Appender(String),

    #[error("logger config error: {0}")]
    Config(#[from] log4rs::config::runtime::ConfigErrors),

    #[error("a global logger is already installed")]
    AlreadyInitialized(#[from] log::SetLoggerError),
}

/// Installs the global logger. Always logs to stdout; when `log_dir` is given, also
/// writes a rolling full log plus a rolling warnings-and-errors log into it.
///
/// `filters` follows the `root_level,module=level,...` syntax and is applied on top of
/// the [`DEFAULT_LOGGER_ENV`] environment variable.
pub fn init_logger(log_dir: Option<&Path>, filters: &str) -> Result<(), LogError> {
    let mut specs = vec![AppenderSpec::console(CONSOLE_APPENDER, None)];
    if let Some(log_dir) = log_dir {
        specs.push(AppenderSpec::roller(LOG_FILE_APPENDER, None, log_dir, LOG_FILE_NAME)?);
        specs.push(AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(LevelFilter::Warn), log_dir, ERR_LOG_FILE_NAME)?);
    }
    let names = specs.iter().map(|x| x.name).collect::<Vec<_>>();

    let filters = LogFilters::new(LevelFilter::Info).apply(&env::var(DEFAULT_LOGGER_ENV).unwrap_or_default()).apply(filters);
    let config = Config::builder()
        .appenders(specs.into_iter().map(AppenderSpec::appender))
        .loggers(filters.loggers())
        .build(Root::builder().appenders(names).build(filters.root()))?;

    log4rs::init_config(config)?;
    Ok(())
}

/// Console-only logger for tests. Subsequent calls are no-ops.
pub fn try_init_logger(filters: &str) {
    let _ = init_logger(None, filters);
}

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => ( $crate::log::facade::trace!($($t)*) )
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => ( $crate::log::facade::debug!($($t)*) )
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => ( $crate::log::facade::info!($($t)*) )
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => ( $crate::log::facade::warn!($($t)*) )
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => ( $crate::log::facade::error!($($t)*) )
}
