//! Minimal stderr logger for training runs.
//!
//! Prints `[elapsed LEVEL target] message`. Training runs last minutes to
//! hours, so the elapsed prefix doubles as a coarse progress clock.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV_VAR: &str = "HAAR_CASCADE_LOG";

struct TrainingLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for TrainingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let target = record.target();
        let short_target = target.rsplit("::").next().unwrap_or(target);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:9.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short_target,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<TrainingLogger> = OnceLock::new();

/// Install the logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| TrainingLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install the logger with the level named by `HAAR_CASCADE_LOG`
/// (`error`..`trace`, `off`), falling back to `default`.
pub fn init_from_env(default: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_level(level_from_env(default))
}

fn level_from_env(default: LevelFilter) -> LevelFilter {
    std::env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(default)
}

/// Crates whose events [`init_tracing`] shows by default.
const TRAINING_TARGETS: [&str; 3] = ["haar_cascade", "haar_cascade_core", "haar_cascade_train"];

/// `tracing` directives showing the training crates at `level` and every
/// other target at `warn`.
pub fn training_directives(level: LevelFilter) -> String {
    let level = level.to_string().to_lowercase();
    let mut directives = String::from("warn");
    for target in TRAINING_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// `RUST_LOG` directives win when set; otherwise the `HAAR_CASCADE_LOG`
/// level (default `info`) applies to the training crates only.
#[cfg(feature = "tracing")]
fn tracing_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(training_directives(level_from_env(LevelFilter::Info))))
}

/// Install a `tracing` subscriber on stderr; span close events carry the
/// duration of each instrumented training step. `json` switches to one
/// flattened JSON object per event.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let builder = fmt()
        .with_env_filter(tracing_filter())
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
