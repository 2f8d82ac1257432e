//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] or
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as work items (pages, images, spreadsheet cells) complete.
//!
//! # Example
//!
//! ```rust
//! use ocr_batch::{BatchProgressCallback, OcrConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, label: &str, total: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{label} done ({done}/{total})");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//! let config = OcrConfig::builder()
//!     .progress_callback(cb as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch dispatchers as they process each item.
///
/// Items run concurrently, so implementations must be `Send + Sync` and
/// protect shared mutable state. Completion events are delivered from the
/// collecting task, one at a time, in completion order. All methods default
/// to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any item is submitted.
    ///
    /// * `source` — file being processed (OCR) or workbook path (extraction)
    /// * `total`  — number of items that will be submitted
    fn on_batch_start(&self, source: &str, total: usize) {
        let _ = (source, total);
    }

    /// Called when an item finishes successfully.
    fn on_item_complete(&self, label: &str, total: usize) {
        let _ = (label, total);
    }

    /// Called when an item fails.
    fn on_item_error(&self, label: &str, total: usize, error: &str) {
        let _ = (label, total, error);
    }

    /// Called once after every item has been collected.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in the config structs.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, _source: &str, total: usize) {
            self.started_total.store(total, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _label: &str, _total: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, _label: &str, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start("a.pdf", 2);
        cb.on_item_complete("page 1", 2);
        cb.on_item_error("page 2", 2, "engine failed");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn test_tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            started_total: AtomicUsize::new(0),
            completed_total: AtomicUsize::new(0),
        };

        tracker.on_batch_start("scan.pdf", 3);
        tracker.on_item_complete("page 1", 3);
        tracker.on_item_complete("page 3", 3);
        tracker.on_item_error("page 2", 3, "tesseract exited 1");
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 2);
    }
}
