// src/watch/debounce.rs

//! Per-rule debouncing of raw filesystem events.
//!
//! Each watch rule is either `Idle` or `Debouncing` until a deadline. The
//! first matching event opens a window of the rule's debounce duration;
//! every event inside that window is collapsed into it. When the deadline
//! passes the rule is reported as due exactly once and returns to `Idle`.
//!
//! This type is synchronous and takes `now` explicitly so it can be tested
//! without a runtime or real clock.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone)]
struct Window {
    deadline: Instant,
    /// Relative paths seen during the window, in arrival order.
    paths: Vec<String>,
    events: usize,
}

/// A rule whose debounce window has closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTrigger {
    pub rule: String,
    pub paths: Vec<String>,
    /// Number of raw events collapsed into this trigger.
    pub events: usize,
}

#[derive(Debug, Default)]
pub struct Debouncer {
    windows: BTreeMap<String, Window>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw event for `rule`.
    ///
    /// Returns `true` if this event opened a new window (the rule moved from
    /// `Idle` to `Debouncing`), `false` if it was collapsed into an open one.
    pub fn record(&mut self, rule: &str, path: &str, now: Instant, window: Duration) -> bool {
        match self.windows.get_mut(rule) {
            Some(open) => {
                open.events += 1;
                if !open.paths.iter().any(|p| p == path) {
                    open.paths.push(path.to_string());
                }
                false
            }
            None => {
                debug!(rule = %rule, ?window, "opening debounce window");
                self.windows.insert(
                    rule.to_string(),
                    Window {
                        deadline: now + window,
                        paths: vec![path.to_string()],
                        events: 1,
                    },
                );
                true
            }
        }
    }

    /// Whether `rule` currently has an open window.
    pub fn is_debouncing(&self, rule: &str) -> bool {
        self.windows.contains_key(rule)
    }

    /// Earliest deadline among open windows.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.windows.values().map(|w| w.deadline).min()
    }

    /// Remove and return every rule whose deadline is at or before `now`,
    /// ordered by deadline.
    pub fn take_due(&mut self, now: Instant) -> Vec<DueTrigger> {
        let mut due: Vec<(Instant, DueTrigger)> = Vec::new();

        self.windows.retain(|rule, window| {
            if window.deadline <= now {
                due.push((
                    window.deadline,
                    DueTrigger {
                        rule: rule.clone(),
                        paths: std::mem::take(&mut window.paths),
                        events: window.events,
                    },
                ));
                false
            } else {
                true
            }
        });

        due.sort_by_key(|(deadline, _)| *deadline);
        due.into_iter().map(|(_, t)| t).collect()
    }

    /// Drop every open window. Returns how many pending triggers were aborted.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.windows.len();
        self.windows.clear();
        n
    }
}
