//! Progress reporting for tree construction.

use std::sync::Arc;

use parking_lot::Mutex;

/// Receives units of completed work from a split selector.
///
/// The total amount of work is not known to the selector; the builder
/// turns the reported units into a fraction.
pub trait ProgressSink {
    /// Records that `work` more units have been completed.
    fn add_progress(&mut self, work: f64);
}

impl<F: FnMut(f64)> ProgressSink for F {
    fn add_progress(&mut self, work: f64) {
        self(work)
    }
}

/// Shared build progress in the range `[0, 1]`.
///
/// Clones share the same value, so one clone can be polled from another
/// thread while the builder writes through its own.
#[derive(Debug, Clone, Default)]
pub struct BuildProgress {
    fraction: Arc<Mutex<f32>>,
}

impl BuildProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current fraction of completed work.
    pub fn progress(&self) -> f32 {
        *self.fraction.lock()
    }

    /// Stores a new fraction, clamped to `[0, 1]`.
    pub(crate) fn set(&self, fraction: f32) {
        *self.fraction.lock() = fraction.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn closure_is_a_sink() {
        let mut total = 0.0;
        {
            let mut sink = |work: f64| total += work;
            sink.add_progress(2.0);
            sink.add_progress(3.5);
        }
        assert_eq!(total, 5.5);
    }

    #[test]
    fn set_clamps_to_unit_range() {
        let progress = BuildProgress::new();
        assert_eq!(progress.progress(), 0.0);

        progress.set(1.5);
        assert_eq!(progress.progress(), 1.0);

        progress.set(-0.25);
        assert_eq!(progress.progress(), 0.0);
    }

    #[test]
    fn clones_share_value_across_threads() {
        let progress = BuildProgress::new();
        let writer = progress.clone();

        thread::spawn(move || writer.set(0.75))
            .join()
            .expect("writer thread panicked");

        assert_eq!(progress.progress(), 0.75);
    }
}
