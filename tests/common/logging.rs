use std::{io, sync::Once, thread};

use log::LevelFilter;

static LOGGER_INIT: Once = Once::new();

// Set up a logger that prints every message with level `level` and above, tagged with the thread
// that emitted it.
pub(crate) fn setup_logger(level: LevelFilter) {
    LOGGER_INIT.call_once(|| {
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{:?}][{}] {}",
                    thread::current().id(),
                    record.level(),
                    message
                ))
            })
            .level(level)
            .chain(io::stdout())
            .apply()
            .unwrap();
    })
}

// Log a test step, prefixed with the process it concerns, if any.
pub(crate) fn log_with_context(process: Option<u64>, message: &str) {
    match process {
        Some(id) => log::info!("Process {}: {}", id, message),
        None => log::info!("{}", message),
    }
}
