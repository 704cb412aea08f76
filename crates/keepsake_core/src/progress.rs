//! Progress reporting.
//!
//! Operations report a fraction in `0.0..=1.0` to an optional
//! [`ProgressSink`] passed in by the caller. Nothing here is global: a UI
//! that wants one bar for many operations owns a [`ProgressAggregator`] and
//! hands out its items.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Receives progress fractions.
pub trait ProgressSink: Send + Sync {
    /// Reports progress, nominally in `0.0..=1.0`.
    fn report(&self, fraction: f32);
}

impl<F> ProgressSink for F
where
    F: Fn(f32) + Send + Sync,
{
    fn report(&self, fraction: f32) {
        self(fraction);
    }
}

pub(crate) fn report(sink: Option<&dyn ProgressSink>, fraction: f32) {
    if let Some(sink) = sink {
        sink.report(fraction);
    }
}

/// An `f32` in an atomic cell.
#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    fn fetch_max(&self, value: f32) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (value > f32::from_bits(bits)).then(|| value.to_bits())
            });
    }
}

/// Records the last report as `clamp(value / max, 0, 1)`.
#[derive(Debug)]
pub struct ScaledProgress {
    max: f32,
    progress: AtomicF32,
}

impl ScaledProgress {
    /// Creates a sink where reporting `max` means done.
    #[must_use]
    pub fn new(max: f32) -> Self {
        Self {
            max,
            progress: AtomicF32::default(),
        }
    }

    /// Returns the scaled progress.
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress.load()
    }

    /// Returns true once progress reaches 1.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.progress() >= 1.0
    }
}

impl ProgressSink for ScaledProgress {
    fn report(&self, value: f32) {
        let scaled = if self.max > 0.0 { value / self.max } else { 1.0 };
        self.progress.store(scaled.clamp(0.0, 1.0));
    }
}

/// One operation tracked by a [`ProgressAggregator`].
///
/// Progress only moves forward.
#[derive(Debug, Default)]
pub struct ProgressItem {
    progress: AtomicF32,
}

impl ProgressItem {
    /// Returns the highest fraction reported.
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress.load()
    }

    /// Returns true once progress reaches 1.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.progress() >= 1.0
    }
}

impl ProgressSink for ProgressItem {
    fn report(&self, fraction: f32) {
        self.progress.fetch_max(fraction.clamp(0.0, 1.0));
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    items: Vec<Arc<ProgressItem>>,
    /// Summed item progress when the last item was added.
    baseline_total: f32,
    /// Overall progress when the last item was added.
    baseline: f32,
}

impl AggregatorState {
    /// Returns (overall, summed item progress). Clears the batch once done.
    fn poll(&mut self) -> (f32, f32) {
        if self.items.is_empty() || self.items.iter().all(|item| item.is_done()) {
            self.items.clear();
            return (1.0, 0.0);
        }

        let total: f32 = self.items.iter().map(|item| item.progress()).sum();
        let count = self.items.len() as f32;
        let t = if count > self.baseline_total {
            ((total - self.baseline_total) / (count - self.baseline_total)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (self.baseline + (1.0 - self.baseline) * t, total)
    }
}

/// Combines many operations into one monotone fraction for a loading bar.
///
/// Adding an item mid-batch does not make the bar jump backwards: the
/// current overall progress becomes the new starting point and the
/// remaining distance is shared by all items. Once every item is done the
/// batch is cleared and the next item starts a fresh bar.
///
/// # Example
///
/// ```rust
/// use keepsake_core::{ProgressAggregator, ProgressSink};
///
/// let bar = ProgressAggregator::new();
/// let a = bar.add();
/// let b = bar.add();
/// a.report(1.0);
/// assert_eq!(bar.progress(), 0.5);
/// b.report(1.0);
/// assert_eq!(bar.progress(), 1.0);
/// ```
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    state: Mutex<AggregatorState>,
}

impl ProgressAggregator {
    /// Creates an idle aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a new operation and returns its sink.
    pub fn add(&self) -> Arc<ProgressItem> {
        let mut state = self.state.lock();
        let (overall, total) = state.poll();
        state.baseline = if overall >= 1.0 { 0.0 } else { overall };
        state.baseline_total = total;

        let item = Arc::new(ProgressItem::default());
        state.items.push(Arc::clone(&item));
        item
    }

    /// Returns overall progress; 1 when nothing is in flight.
    pub fn progress(&self) -> f32 {
        self.state.lock().poll().0
    }

    /// Number of operations in the current batch.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if no batch is in progress.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
