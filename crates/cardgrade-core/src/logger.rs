//! Stderr logger for the grading tools.
//!
//! Lines look like `[  0.412s  WARN vision::rectify] message`: elapsed time
//! since installation, level, and the grading stage that logged. Records from
//! the HTTP and inference dependencies are held at `WARN` unless the chosen
//! level is stricter.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Target prefix shared by every grading crate.
const LOG_TARGET_PREFIX: &str = "cardgrade";

/// Environment variable read by [`init_tracing`] before `RUST_LOG`.
pub const LOG_ENV: &str = "CARDGRADE_LOG";

/// Filter used when neither environment variable is set.
pub const DEFAULT_DIRECTIVES: &str = "warn,cardgrade=info";

struct GradeLogger {
    level: LevelFilter,
    started: Instant,
}

/// Effective level for a record target: grading crates follow `level`,
/// everything else is capped at `WARN`.
fn level_for(target: &str, level: LevelFilter) -> LevelFilter {
    if target.starts_with(LOG_TARGET_PREFIX) {
        level
    } else {
        level.min(LevelFilter::Warn)
    }
}

/// `cardgrade_vision::rectify` -> `vision::rectify`; the facade crate and
/// foreign targets are kept as they are.
fn stage_label(target: &str) -> &str {
    target
        .strip_prefix(LOG_TARGET_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(target)
}

impl Log for GradeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= level_for(metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            stage_label(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<GradeLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| GradeLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Map a `-v` count to a level filter: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
pub fn level_from_verbosity(count: u8) -> LevelFilter {
    match count {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install a `tracing-subscriber` fmt subscriber with span close timings.
///
/// The filter comes from `CARDGRADE_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_DIRECTIVES`].
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .with_target(true)
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_from_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_from_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn dependencies_are_held_at_warn() {
        assert_eq!(level_for("cardgrade_llm::client", LevelFilter::Debug), LevelFilter::Debug);
        assert_eq!(level_for("cardgrade", LevelFilter::Trace), LevelFilter::Trace);
        assert_eq!(level_for("reqwest::connect", LevelFilter::Debug), LevelFilter::Warn);
        assert_eq!(level_for("ort::session", LevelFilter::Error), LevelFilter::Error);
    }

    #[test]
    fn stage_labels_drop_the_crate_prefix() {
        assert_eq!(stage_label("cardgrade_vision::rectify"), "vision::rectify");
        assert_eq!(stage_label("cardgrade_identity"), "identity");
        assert_eq!(stage_label("cardgrade::pipeline"), "cardgrade::pipeline");
        assert_eq!(stage_label("hyper::proto"), "hyper::proto");
    }
}
