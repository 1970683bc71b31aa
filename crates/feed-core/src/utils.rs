use regex::Regex;
use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

/// Sources serialise a missing name in a handful of ways; all of them
/// mean "no name".
fn absent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(null|undefined|none|nil)?\s*$").expect("absent-value pattern")
    })
}

/// Returns the trimmed name, or `None` when it is empty or one of the
/// literals a source uses for an absent value.
pub fn present_name(name: Option<&str>) -> Option<&str> {
    let name = name?;
    if absent_pattern().is_match(name) {
        return None;
    }
    Some(name.trim())
}

/// Coalesces a burst of values into the last one, released once nothing
/// new has arrived for the quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Take the pending value if the quiet period has elapsed.
    pub fn ready(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now.saturating_duration_since(*at) >= self.quiet => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
