//! Stderr logger for scanner diagnostics.
//!
//! Lines read `+   0.012s DEBUG detect::pipeline: scan: Idle -> Preprocessing`:
//! time since the logger was installed, level, and the emitting module with
//! the `docscan_` crate prefix dropped. The library never installs a logger
//! on its own; call [`init_with_level`] (or `init_tracing` with the
//! `tracing` feature) once at startup.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct ScanLogger {
    started: OnceLock<Instant>,
    /// Lines stderr refused; a logger has nowhere else to report them.
    dropped: AtomicU64,
}

static LOGGER: ScanLogger = ScanLogger {
    started: OnceLock::new(),
    dropped: AtomicU64::new(0),
};
static INSTALLED: AtomicBool = AtomicBool::new(false);

fn display_target(target: &str) -> &str {
    target.strip_prefix("docscan_").unwrap_or(target)
}

fn write_record(out: &mut impl Write, elapsed: f64, record: &Record) -> io::Result<()> {
    writeln!(
        out,
        "+{:8.3}s {:>5} {}: {}",
        elapsed,
        record.level(),
        display_target(record.target()),
        record.args()
    )
}

impl Log for ScanLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.started.get_or_init(Instant::now).elapsed().as_secs_f64();
        if write_record(&mut io::stderr().lock(), elapsed, record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn flush(&self) {
        if io::stderr().flush().is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Install the stderr logger, or change its level if it is already in place.
///
/// Fails only when some other `log` implementation owns the global slot.
pub fn init_with_level(level: LevelFilter) -> Result<(), SetLoggerError> {
    if !INSTALLED.swap(true, Ordering::AcqRel) {
        LOGGER.started.get_or_init(Instant::now);
        if let Err(err) = log::set_logger(&LOGGER) {
            INSTALLED.store(false, Ordering::Release);
            return Err(err);
        }
    }
    log::set_max_level(level);
    Ok(())
}

/// Number of log lines (and flushes) that could not be written to stderr.
pub fn dropped_records() -> u64 {
    LOGGER.dropped.load(Ordering::Relaxed)
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// When a global subscriber already exists it is kept, and the refusal is
/// reported through `log`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = if json {
        fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
    if let Err(err) = installed {
        log::warn!("keeping the existing tracing subscriber: {err}");
    }
}
