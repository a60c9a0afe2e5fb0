use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crate::detection::domain::document_tracker::DocumentTracker;
use crate::detection::domain::face_roles::assign_roles;
use crate::detection::domain::object_detector::{ObjectDetector, RawDetection};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::rendering::redaction_renderer::RedactionRenderer;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::DetectionConfig;
use crate::shared::error::FrameError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_codec::FrameCodec;

/// Per-stream knobs of the frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Linear scale applied to the frame before document detection.
    pub document_upscale: f64,
    pub min_document_width: i32,
    pub min_document_height: i32,
    /// Run face and document detection on separate threads.
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&DetectionConfig::default())
    }
}

impl From<&DetectionConfig> for PipelineOptions {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            document_upscale: config.document_upscale,
            min_document_width: config.min_document_width,
            min_document_height: config.min_document_height,
            parallel: config.parallel,
        }
    }
}

/// An annotated frame and what was found in it.
#[derive(Debug)]
pub struct RedactedFrame {
    pub frame: Frame,
    pub face_count: usize,
    pub document_count: usize,
    /// Detectors that failed or returned malformed output on this frame.
    pub detector_failures: usize,
}

/// Output of [`RedactFrameUseCase::process_encoded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResult {
    pub index: usize,
    pub encoded: Vec<u8>,
    pub face_count: usize,
    pub document_count: usize,
    pub detector_failures: usize,
}

struct DetectionPass {
    faces: Vec<RawDetection>,
    documents: Vec<RawDetection>,
    failures: usize,
    face_ms: f64,
    document_ms: f64,
}

/// Frame pipeline: detect → track → render, once per frame of one stream.
///
/// Owns the only cross-frame state (the document tracker), so one instance
/// serves exactly one stream and frames must arrive in order.
pub struct RedactFrameUseCase {
    face_detector: Box<dyn ObjectDetector>,
    document_detectors: Vec<Box<dyn ObjectDetector>>,
    tracker: DocumentTracker,
    renderer: RedactionRenderer,
    codec: Box<dyn FrameCodec>,
    logger: Box<dyn PipelineLogger>,
    options: PipelineOptions,
    total_frames: usize,
}

impl RedactFrameUseCase {
    pub fn new(
        face_detector: Box<dyn ObjectDetector>,
        document_detectors: Vec<Box<dyn ObjectDetector>>,
        tracker: DocumentTracker,
        renderer: RedactionRenderer,
        codec: Box<dyn FrameCodec>,
        logger: Box<dyn PipelineLogger>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            face_detector,
            document_detectors,
            tracker,
            renderer,
            codec,
            logger,
            options,
            total_frames: 0,
        }
    }

    /// Expected stream length, for progress reporting only.
    pub fn with_total_frames(mut self, total: usize) -> Self {
        self.total_frames = total;
        self
    }

    pub fn tracker(&self) -> &DocumentTracker {
        &self.tracker
    }

    /// Decode `bytes`, process the frame, and JPEG-encode the result.
    ///
    /// Undecodable input fails before the tracker sees the frame.
    pub fn process_encoded(
        &mut self,
        bytes: &[u8],
        index: usize,
    ) -> Result<EncodedResult, FrameError> {
        let frame = self.codec.decode(bytes, index)?;
        let redacted = self.process(frame)?;
        let encoded = self.codec.encode(&redacted.frame)?;
        Ok(EncodedResult {
            index,
            encoded,
            face_count: redacted.face_count,
            document_count: redacted.document_count,
            detector_failures: redacted.detector_failures,
        })
    }

    /// Encode a frame with this pipeline's codec.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, FrameError> {
        self.codec.encode(frame)
    }

    pub fn process(&mut self, frame: Frame) -> Result<RedactedFrame, FrameError> {
        let index = frame.index();

        let pass = self.detect(&frame);
        self.logger.timing("face_detect", pass.face_ms);
        self.logger.timing("document_detect", pass.document_ms);

        // Every box the face model returned counts, even one too thin to draw
        let face_count = pass.faces.len();
        let face_boxes: Vec<BoundingBox> = pass
            .faces
            .iter()
            .filter_map(|d| BoundingBox::from_scaled(d.x1, d.y1, d.x2, d.y2, 1.0))
            .collect();
        let faces = assign_roles(&face_boxes);

        let scale = self.options.document_upscale;
        let raw_documents: Vec<BoundingBox> = pass
            .documents
            .iter()
            .filter_map(|d| BoundingBox::from_scaled(d.x1, d.y1, d.x2, d.y2, scale))
            .filter(|b| {
                b.width() >= self.options.min_document_width
                    && b.height() >= self.options.min_document_height
            })
            .collect();

        let t0 = Instant::now();
        let documents = self.tracker.update(&raw_documents);
        self.logger.timing("track", elapsed_ms(t0));

        let t0 = Instant::now();
        let frame = self.renderer.render(frame, &faces, &documents)?;
        self.logger.timing("render", elapsed_ms(t0));

        self.logger.metric("faces", face_count as f64);
        self.logger.metric("documents", documents.len() as f64);
        self.logger.metric("detector_failures", pass.failures as f64);
        self.logger.progress(index, self.total_frames);

        log::debug!(
            "Frame {index}: {face_count} faces, {} raw / {} confirmed documents",
            raw_documents.len(),
            documents.len()
        );

        Ok(RedactedFrame {
            frame,
            face_count,
            document_count: documents.len(),
            detector_failures: pass.failures,
        })
    }

    /// Emit the logger's end-of-stream summary.
    pub fn log_summary(&self) {
        self.logger.summary();
    }

    fn detect(&mut self, frame: &Frame) -> DetectionPass {
        let scale = self.options.document_upscale;
        let upscaled = if scale == 1.0 {
            None
        } else {
            frame.upscaled(scale)
        };
        let document_frame = match &upscaled {
            Some(up) => Some(up),
            None if scale == 1.0 => Some(frame),
            None => {
                log::warn!("Frame {} cannot be scaled by {scale}", frame.index());
                None
            }
        };

        let face_detector = self.face_detector.as_mut();
        let document_detectors = self.document_detectors.as_mut_slice();

        let ((faces, face_ms), (documents, doc_failures, document_ms)) = if self.options.parallel {
            thread::scope(|s| {
                let face_job = s.spawn(move || timed_face_detection(face_detector, frame));
                let docs = timed_document_detection(document_detectors, document_frame);
                let faces = face_job
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload));
                (faces, docs)
            })
        } else {
            (
                timed_face_detection(face_detector, frame),
                timed_document_detection(document_detectors, document_frame),
            )
        };

        let face_failed = faces.is_none();
        DetectionPass {
            faces: faces.unwrap_or_default(),
            documents,
            failures: doc_failures + usize::from(face_failed),
            face_ms,
            document_ms,
        }
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

fn timed_face_detection(
    detector: &mut dyn ObjectDetector,
    frame: &Frame,
) -> (Option<Vec<RawDetection>>, f64) {
    let t0 = Instant::now();
    let result = run_detector(detector, frame);
    (result, elapsed_ms(t0))
}

/// Pools the output of every document detector. Returns the pooled boxes
/// and how many detectors failed.
fn timed_document_detection(
    detectors: &mut [Box<dyn ObjectDetector>],
    frame: Option<&Frame>,
) -> (Vec<RawDetection>, usize, f64) {
    let t0 = Instant::now();
    let Some(frame) = frame else {
        return (Vec::new(), detectors.len(), 0.0);
    };

    let mut pooled = Vec::new();
    let mut failures = 0;
    for detector in detectors.iter_mut() {
        match run_detector(detector.as_mut(), frame) {
            Some(dets) => pooled.extend(dets),
            None => failures += 1,
        }
    }
    (pooled, failures, elapsed_ms(t0))
}

/// Runs one detector, turning errors, panics and malformed output into
/// `None` so a bad detector only empties its own contribution.
fn run_detector(detector: &mut dyn ObjectDetector, frame: &Frame) -> Option<Vec<RawDetection>> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(frame)));
    let result = match outcome {
        Ok(result) => result,
        Err(payload) => {
            log::warn!(
                "{} panicked on frame {}: {}",
                detector.name(),
                frame.index(),
                panic_message(payload.as_ref())
            );
            return None;
        }
    };

    match result {
        Ok(dets) if dets.iter().all(RawDetection::is_well_formed) => Some(dets),
        Ok(_) => {
            log::warn!(
                "{} returned non-finite output on frame {}; ignoring it",
                detector.name(),
                frame.index()
            );
            None
        }
        Err(e) => {
            log::warn!("{} failed on frame {}: {e}", detector.name(), frame.index());
            None
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
