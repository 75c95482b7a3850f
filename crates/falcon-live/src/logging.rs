//! Tracing setup and structured loop logging.

use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: colored text by default, JSON when
/// `LOG_FORMAT=json`. `RUST_LOG` directives extend the defaults.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["falcon=info", "hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Session-scoped logger so every loop event carries the session number.
#[derive(Debug, Clone, Copy)]
pub struct SessionLogger {
    session: u64,
}

impl SessionLogger {
    pub fn new(session: u64) -> Self {
        Self { session }
    }

    pub fn log_start(&self, capture_ms: u64, measure_ms: u64) {
        info!(
            session = self.session,
            capture_ms, measure_ms, "Live detection started"
        );
    }

    pub fn log_stop(&self) {
        info!(session = self.session, "Live detection stopped");
    }

    pub fn log_applied(&self, seq: u64, detections: usize) {
        debug!(session = self.session, seq, detections, "Detection batch applied");
    }

    pub fn log_stale(&self, seq: u64, reason: &str) {
        debug!(session = self.session, seq, reason, "Discarding stale detection response");
    }

    pub fn log_failure(&self, seq: u64, error: &dyn std::fmt::Display) {
        warn!(session = self.session, seq, "Detection request failed: {}", error);
    }
}

/// Suppresses log spam from a failure that repeats every tick.
#[derive(Debug, Default)]
pub struct FailureTracker {
    subject: &'static str,
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            subject: "Detection",
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Name used in recovery/suppression log lines, e.g. `Camera`.
    pub fn with_subject(mut self, subject: &'static str) -> Self {
        self.subject = subject;
        self
    }

    /// Record a success (resets the failure count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            info!(
                "{} recovered after {} consecutive failures",
                self.subject, self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failure. Returns `true` if this one should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if self.consecutive_failures == self.max_logged_failures + 1 {
            self.suppressed = true;
            warn!(
                "Suppressing further {} failure logs after {} consecutive failures",
                self.subject.to_lowercase(),
                self.max_logged_failures
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.suppressed = false;
    }
}
