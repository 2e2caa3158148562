// ============================================================================
// SUBJECT SEGMENTATION: external classifier behind a background job
// ============================================================================
//
// The classifier sees the current rendered frame and answers with one
// confidence per pixel (0..1). It runs on the rayon pool; the session polls
// the job's channel and only touches history once a valid mask arrived.
// A panicking or failing classifier is reported, never propagated.
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use image::{GrayImage, RgbaImage};
use tracing::{debug, warn};

use crate::error::SegmentationError;
use crate::mask::coverage_from_confidence;

/// A subject classifier. Implementations may block; they are never called
/// on the thread that owns the session.
pub trait Segmenter: Send + Sync {
    /// Per-pixel confidence in row-major order, `width * height` values.
    fn segment(&self, frame: &RgbaImage) -> Result<Vec<f32>, SegmentationError>;
}

impl<F> Segmenter for F
where
    F: Fn(&RgbaImage) -> Result<Vec<f32>, SegmentationError> + Send + Sync,
{
    fn segment(&self, frame: &RgbaImage) -> Result<Vec<f32>, SegmentationError> {
        self(frame)
    }
}

type JobResult = Result<GrayImage, SegmentationError>;

/// An in-flight segmentation request.
pub struct SegmentationJob {
    receiver: Receiver<JobResult>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_segmenter(segmenter: &dyn Segmenter, frame: &RgbaImage) -> JobResult {
    let (w, h) = frame.dimensions();
    let confidence = segmenter.segment(frame)?;
    let expected = w as usize * h as usize;
    let got = confidence.len();
    coverage_from_confidence(&confidence, w, h)
        .ok_or(SegmentationError::DimensionMismatch { expected, got })
}

impl SegmentationJob {
    /// Start classifying `frame` in the background.
    pub fn spawn(segmenter: Arc<dyn Segmenter>, frame: RgbaImage) -> Self {
        let (sender, receiver) = mpsc::channel();
        rayon::spawn(move || {
            let start = std::time::Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| run_segmenter(segmenter.as_ref(), &frame)))
                .unwrap_or_else(|payload| Err(SegmentationError::Panicked(panic_message(payload.as_ref()))));
            match &result {
                Ok(_) => debug!(elapsed_ms = start.elapsed().as_millis() as u64, "segmentation finished"),
                Err(e) => warn!(error = %e, "segmentation failed"),
            }
            // The session may have been dropped meanwhile; nothing to do then.
            let _ = sender.send(result);
        });
        Self { receiver }
    }

    /// Non-blocking check. `None` while the classifier is still running.
    pub fn try_take(&self) -> Option<JobResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SegmentationError::Disconnected)),
        }
    }

    /// Block until the classifier answers.
    pub fn wait(self) -> JobResult {
        self.receiver.recv().unwrap_or(Err(SegmentationError::Disconnected))
    }
}
