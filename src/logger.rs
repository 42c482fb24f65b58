use colored::*;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

struct ColoredLogger;

impl log::Log for ColoredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level = match record.level() {
                Level::Error => record.level().to_string().red(),
                Level::Warn => record.level().to_string().yellow(),
                Level::Info => record.level().to_string().green(),
                Level::Debug => record.level().to_string().blue(),
                Level::Trace => record.level().to_string().purple(),
            };
            let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f");
            println!("{} {} - {}", timestamp, level, record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: ColoredLogger = ColoredLogger;

/// Installs the logger. `LOG_LEVEL` picks the filter; default info.
pub fn init_logger() -> Result<(), SetLoggerError> {
    let filter = match std::env::var("LOG_LEVEL").as_deref() {
        Ok("error") => LevelFilter::Error,
        Ok("warn") => LevelFilter::Warn,
        Ok("debug") => LevelFilter::Debug,
        Ok("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    log::set_logger(&LOGGER).map(|()| log::set_max_level(filter))
}
