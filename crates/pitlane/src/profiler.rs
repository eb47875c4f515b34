//! # Section Profiler
//!
//! Named wall-clock sections with running statistics:
//!
//! ```text
//! scope("Frame") ──┬── scope("Update") ── drop ──► Update: calls+1, total+=dt
//!                  └── scope("Render") ── drop ──► Render: calls+1, total+=dt
//!                 drop ─────────────────────────► Frame:  calls+1, total+=dt
//! ```
//!
//! One `Profiler` is created by the engine and shared through `Arc`, so pool
//! workers and subsystems time their work into the same table as the frame loop.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sort order of [`Profiler::report`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportOrder {
    /// Alphabetical by section name.
    Name,
    /// Largest accumulated time first.
    #[default]
    TotalTime,
    /// Largest average time per call first.
    AverageTime,
}

/// Accumulated timings of one section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionStats {
    /// Completed calls.
    pub calls: u64,
    /// Sum of all call durations.
    pub total: Duration,
    /// Shortest call.
    pub min: Duration,
    /// Longest call.
    pub max: Duration,
}

impl SectionStats {
    /// Mean call duration, zero before the first call.
    #[must_use]
    pub fn average(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total / calls,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.calls as f64),
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        if self.calls == 1 {
            self.min = elapsed;
            self.max = elapsed;
        } else {
            self.min = self.min.min(elapsed);
            self.max = self.max.max(elapsed);
        }
    }
}

#[derive(Default)]
struct Section {
    stats: SectionStats,
    // Start times of `begin` calls awaiting their `end`, innermost last.
    open: Vec<Instant>,
}

/// Thread-safe section timer.
pub struct Profiler {
    enabled: AtomicBool,
    sections: Mutex<HashMap<String, Section>>,
}

impl Profiler {
    /// Creates a profiler.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            sections: Mutex::new(HashMap::new()),
        }
    }

    /// Whether sections are being recorded.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turns recording on or off. Existing statistics are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Times the enclosing block under `name`.
    #[must_use = "the section ends when the guard is dropped"]
    pub fn scope<'a>(&'a self, name: &'a str) -> ProfileScope<'a> {
        ProfileScope {
            profiler: self,
            name,
            start: self.is_enabled().then(Instant::now),
        }
    }

    /// Opens a manual section. Nested `begin`s of the same name pair with
    /// `end`s innermost-first.
    pub fn begin(&self, name: &str) {
        if !self.is_enabled() {
            return;
        }
        let now = Instant::now();
        self.sections
            .lock()
            .entry(name.to_owned())
            .or_default()
            .open
            .push(now);
    }

    /// Closes the innermost open section `name`. Unmatched calls are ignored.
    pub fn end(&self, name: &str) {
        if !self.is_enabled() {
            return;
        }
        let now = Instant::now();
        let mut sections = self.sections.lock();
        if let Some(section) = sections.get_mut(name) {
            if let Some(start) = section.open.pop() {
                section.stats.record(now.saturating_duration_since(start));
            }
        }
    }

    /// Records one completed call of `elapsed` under `name`.
    pub fn record(&self, name: &str, elapsed: Duration) {
        if !self.is_enabled() {
            return;
        }
        let mut sections = self.sections.lock();
        match sections.get_mut(name) {
            Some(section) => section.stats.record(elapsed),
            None => {
                let mut section = Section::default();
                section.stats.record(elapsed);
                sections.insert(name.to_owned(), section);
            }
        }
    }

    /// Statistics of one section, if it has been seen.
    #[must_use]
    pub fn stats(&self, name: &str) -> Option<SectionStats> {
        self.sections.lock().get(name).map(|s| s.stats)
    }

    /// All sections in the requested order.
    #[must_use]
    pub fn snapshot(&self, order: ReportOrder) -> Vec<(String, SectionStats)> {
        let mut rows: Vec<_> = self
            .sections
            .lock()
            .iter()
            .map(|(name, section)| (name.clone(), section.stats))
            .collect();

        match order {
            ReportOrder::Name => rows.sort_by(|a, b| a.0.cmp(&b.0)),
            ReportOrder::TotalTime => {
                rows.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(&b.0)));
            }
            ReportOrder::AverageTime => rows.sort_by(|a, b| {
                b.1.average()
                    .cmp(&a.1.average())
                    .then_with(|| a.0.cmp(&b.0))
            }),
        }
        rows
    }

    /// Clears every section.
    pub fn reset(&self) {
        self.sections.lock().clear();
    }

    /// Formats the statistics as a fixed-width table in milliseconds.
    #[must_use]
    pub fn report(&self, order: ReportOrder) -> String {
        if !self.is_enabled() {
            return "Profiler is disabled\n".to_owned();
        }

        let mut out = String::new();
        out.push_str("======== Profiling Report ========\n");
        let _ = writeln!(
            out,
            "{:<30}{:>10}{:>15}{:>15}{:>15}{:>15}",
            "Section", "Calls", "Total (ms)", "Avg (ms)", "Min (ms)", "Max (ms)"
        );
        out.push_str(&"-".repeat(100));
        out.push('\n');

        for (name, stats) in self.snapshot(order) {
            let _ = writeln!(
                out,
                "{:<30}{:>10}{:>15.3}{:>15.3}{:>15.3}{:>15.3}",
                name,
                stats.calls,
                millis(stats.total),
                millis(stats.average()),
                millis(stats.min),
                millis(stats.max),
            );
        }
        out.push_str("==================================\n");
        out
    }

    /// Writes [`report`](Self::report) to `path`.
    ///
    /// Returns `Ok(false)` without touching the file when disabled.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file cannot be written.
    pub fn save_report(&self, path: impl AsRef<Path>, order: ReportOrder) -> std::io::Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        std::fs::write(path, self.report(order))?;
        Ok(true)
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("enabled", &self.is_enabled())
            .field("sections", &self.sections.lock().len())
            .finish()
    }
}

/// Guard returned by [`Profiler::scope`].
pub struct ProfileScope<'a> {
    profiler: &'a Profiler,
    name: &'a str,
    start: Option<Instant>,
}

impl Drop for ProfileScope<'_> {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            self.profiler.record(self.name, start.elapsed());
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
