//! # Simple logging provider
//!
//! The DDR driver only uses the [log] facade. Boards which do not have a logger yet can use
//! [ConsoleLogger] with any blocking [embedded_io::Write] byte sink, for example a UART which
//! was set up by the boot ROM.
//!
//! ```ignore
//! static LOGGER: ConsoleLogger<BootUart> = ConsoleLogger::new();
//!
//! LOGGER.init(uart, log::LevelFilter::Info);
//! ```
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use embedded_io::Write as _;
use log::{LevelFilter, set_logger, set_max_level};

/// Blocking logger which performs its writes inside a critical section.
pub struct ConsoleLogger<W> {
    init_done: AtomicBool,
    writer: Mutex<RefCell<Option<W>>>,
}

impl<W> ConsoleLogger<W> {
    pub const fn new() -> Self {
        Self {
            init_done: AtomicBool::new(false),
            writer: Mutex::new(RefCell::new(None)),
        }
    }
}

impl<W> Default for ConsoleLogger<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: embedded_io::Write + Send + 'static> ConsoleLogger<W> {
    /// Installs this logger as the global logger. Subsequent calls are ignored.
    pub fn init(&'static self, writer: W, level: LevelFilter) {
        if self.init_done.swap(true, Ordering::Relaxed) {
            return;
        }
        critical_section::with(|cs| {
            self.writer.borrow(cs).replace(Some(writer));
        });
        // Can only fail if another logger was installed, in which case that one is kept.
        let _ = set_logger(self);
        set_max_level(level);
    }

    /// Returns the byte sink, for example to hand the UART over to a console.
    pub fn release(&self) -> Option<W> {
        critical_section::with(|cs| self.writer.borrow(cs).take())
    }
}

impl<W: embedded_io::Write + Send> log::Log for ConsoleLogger<W> {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        critical_section::with(|cs| {
            let mut opt_writer = self.writer.borrow(cs).borrow_mut();
            if let Some(writer) = opt_writer.as_mut() {
                // Nowhere to report a failing log sink.
                let _ = write!(writer, "{} - {}\r\n", record.level(), record.args());
            }
        })
    }

    fn flush(&self) {
        critical_section::with(|cs| {
            let mut opt_writer = self.writer.borrow(cs).borrow_mut();
            if let Some(writer) = opt_writer.as_mut() {
                let _ = writer.flush();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct Sink(Vec<u8>);

    impl embedded_io::ErrorType for Sink {
        type Error = core::convert::Infallible;
    }

    impl embedded_io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn record_format() {
        static LOGGER: ConsoleLogger<Sink> = ConsoleLogger::new();
        critical_section::with(|cs| {
            LOGGER.writer.borrow(cs).replace(Some(Sink::default()));
        });
        log::Log::log(
            &LOGGER,
            &log::Record::builder()
                .args(format_args!("PLL2 locked"))
                .level(log::Level::Info)
                .build(),
        );
        let sink = LOGGER.release().unwrap();
        assert_eq!(sink.0.as_slice(), b"INFO - PLL2 locked\r\n");
    }
}
