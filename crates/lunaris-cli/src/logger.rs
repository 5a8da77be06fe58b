//! Minimal stderr sink for the `log` facade.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// `-v` enables debug, `-vv` trace; otherwise only warnings.
pub fn init(verbosity: u8) {
    let level = level_for(verbosity);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => Level::Trace.to_level_filter(),
    }
}
