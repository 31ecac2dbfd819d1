//! Console reporting for batch assembly. Workers share one reporter by
//! reference; tallies are kept even when printing is disabled.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// How one segment of a batch ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentOutcome {
    Assembled,
    NoMatch,
    Failed,
}

/// Snapshot of the running batch counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub total: usize,
    pub done: usize,
    pub assembled: usize,
    pub failed: usize,
    pub candidates: usize,
}

pub struct ConsoleProgress {
    enabled: bool,
    started: Instant,
    total: AtomicUsize,
    done: AtomicUsize,
    assembled: AtomicUsize,
    failed: AtomicUsize,
    candidates: AtomicUsize,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            started: Instant::now(),
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            assembled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            candidates: AtomicUsize::new(0),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.emit(msg.as_ref());
    }

    /// Resets the tallies for a batch of `total` segments.
    pub fn begin(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        for counter in [&self.done, &self.assembled, &self.failed, &self.candidates] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Records one finished segment that came with `candidates` fuzzy
    /// matches. A status line is printed every 5% of the batch.
    pub fn segment_done(&self, candidates: usize, outcome: SegmentOutcome) {
        self.candidates.fetch_add(candidates, Ordering::Relaxed);
        match outcome {
            SegmentOutcome::Assembled => {
                self.assembled.fetch_add(1, Ordering::Relaxed);
            }
            SegmentOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            SegmentOutcome::NoMatch => {}
        }
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        let step = (total / 20).max(1);
        if done % step == 0 || done == total {
            self.emit(&status_line(&self.tally()));
        }
    }

    #[must_use]
    pub fn tally(&self) -> BatchTally {
        BatchTally {
            total: self.total.load(Ordering::Relaxed),
            done: self.done.load(Ordering::Relaxed),
            assembled: self.assembled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            candidates: self.candidates.load(Ordering::Relaxed),
        }
    }

    fn emit(&self, line: &str) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.started.elapsed());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {line}");
    }
}

fn status_line(t: &BatchTally) -> String {
    let total = t.total.max(1);
    let done = t.done.min(total);
    let pct = done as f64 * 100.0 / total as f64;
    format!(
        "segments {done}/{total} ({pct:5.1}%), {} assembled, {} failed, {} candidates",
        t.assembled, t.failed, t.candidates
    )
}

fn fmt_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, _) => format!("{:.1}s", elapsed.as_secs_f64()),
        (0, m, s) => format!("{m}m{s:02}s"),
        (h, m, s) => format!("{h}h{m:02}m{s:02}s"),
    }
}
