//! Multi-frame scenarios for the document tracker, on its own and driven
//! through the full redaction pipeline with scripted detectors.

use std::sync::{Arc, Mutex};

use framesafe_core::blurring::domain::frame_blurrer::FrameBlurrer;
use framesafe_core::detection::domain::document_tracker::{DocumentTracker, TrackerConfig};
use framesafe_core::detection::domain::object_detector::{
    DetectionClass, ObjectDetector, RawDetection,
};
use framesafe_core::pipeline::pipeline_logger::NullPipelineLogger;
use framesafe_core::pipeline::redact_frame_use_case::{PipelineOptions, RedactFrameUseCase};
use framesafe_core::rendering::redaction_renderer::RedactionRenderer;
use framesafe_core::shared::bounding_box::BoundingBox;
use framesafe_core::shared::frame::Frame;
use framesafe_core::video::infrastructure::jpeg_frame_codec::JpegFrameCodec;

const JITTER: [(i32, i32, i32, i32); 10] = [
    (0, 0, 0, 0),
    (2, -1, 1, 2),
    (-2, 1, -1, -2),
    (1, 2, 2, -1),
    (-1, -2, -2, 1),
    (2, 0, -1, 2),
    (0, -2, 2, 0),
    (-2, 1, 0, -2),
    (1, -1, -2, 1),
    (-1, 2, 1, -1),
];

fn bbox(x1: i32, y1: i32, x2: i32, y2: i32) -> BoundingBox {
    BoundingBox::new(x1, y1, x2, y2).unwrap()
}

fn jittered(base: BoundingBox, frame: usize, amplitude: i32) -> BoundingBox {
    let (dx1, dy1, dx2, dy2) = JITTER[frame % JITTER.len()];
    bbox(
        base.x1() + dx1 * amplitude,
        base.y1() + dy1 * amplitude,
        base.x2() + dx2 * amplitude,
        base.y2() + dy2 * amplitude,
    )
}

fn tracker(alpha: f64) -> DocumentTracker {
    DocumentTracker::new(TrackerConfig {
        smooth_alpha: alpha,
        ..TrackerConfig::default()
    })
}

fn abs_error(a: &BoundingBox, b: &BoundingBox) -> i32 {
    (a.x1() - b.x1()).abs()
        + (a.y1() - b.y1()).abs()
        + (a.x2() - b.x2()).abs()
        + (a.y2() - b.y2()).abs()
}

/// Mean over the four coordinates of their population variance.
fn coordinate_variance(boxes: &[BoundingBox]) -> f64 {
    let n = boxes.len() as f64;
    let getters: [fn(&BoundingBox) -> i32; 4] = [
        BoundingBox::x1,
        BoundingBox::y1,
        BoundingBox::x2,
        BoundingBox::y2,
    ];
    getters
        .iter()
        .map(|get| {
            let mean = boxes.iter().map(|b| get(b) as f64).sum::<f64>() / n;
            boxes
                .iter()
                .map(|b| (get(b) as f64 - mean).powi(2))
                .sum::<f64>()
                / n
        })
        .sum::<f64>()
        / 4.0
}

// ── Tracker on its own ─────────────────────────────────────────────

#[test]
fn test_jittered_card_is_confirmed_on_fourth_frame_and_smoothed() {
    let truth = bbox(10, 10, 50, 30);
    let mut tracker = tracker(0.6);

    let outputs: Vec<Vec<BoundingBox>> = (0..JITTER.len())
        .map(|i| tracker.update(&[jittered(truth, i, 1)]))
        .collect();

    assert!(outputs[..3].iter().all(Vec::is_empty));
    let expected = [
        bbox(11, 12, 52, 29),
        bbox(10, 10, 50, 30),
        bbox(11, 10, 49, 31),
        bbox(10, 9, 51, 30),
        bbox(9, 10, 50, 29),
        bbox(10, 9, 49, 30),
        bbox(9, 11, 50, 29),
    ];
    for (frame, want) in (3..).zip(expected.iter()) {
        assert_eq!(outputs[frame], vec![*want], "frame {}", frame + 1);
    }

    let raw_error: i32 = (4..10).map(|i| abs_error(&jittered(truth, i, 1), &truth)).sum();
    let smoothed_error: i32 = (4..10).map(|i| abs_error(&outputs[i][0], &truth)).sum();
    assert_eq!(raw_error, 30);
    assert_eq!(smoothed_error, 12);
}

#[test]
fn test_confirmed_card_survives_forget_window_then_disappears() {
    let card = bbox(10, 10, 50, 30);
    let mut tracker = tracker(0.6);
    for _ in 0..4 {
        tracker.update(&[card]);
    }

    let visible: Vec<usize> = (0..10).map(|_| tracker.update(&[]).len()).collect();

    assert_eq!(visible, vec![1, 1, 1, 1, 1, 1, 1, 1, 0, 0]);
}

#[test]
fn test_overlapping_detections_of_one_card_yield_one_track() {
    let mut tracker = tracker(0.6);
    let pair = [bbox(10, 10, 50, 30), bbox(12, 11, 52, 31)];

    for _ in 0..3 {
        assert!(tracker.update(&pair).is_empty());
    }
    let confirmed = tracker.update(&pair);

    assert_eq!(confirmed.len(), 1);
    assert_eq!(tracker.candidate_count(), 0);
}

#[test]
fn test_candidate_needs_unbroken_run_of_hits() {
    let card = bbox(10, 10, 50, 30);
    let mut tracker = tracker(0.6);

    for _ in 0..3 {
        tracker.update(&[card]);
    }
    tracker.update(&[]);
    for _ in 0..3 {
        assert!(tracker.update(&[card]).is_empty());
    }

    assert_eq!(tracker.update(&[card]), vec![card]);
}

#[test]
fn test_alpha_one_follows_raw_boxes_exactly() {
    let truth = bbox(100, 100, 200, 160);
    let mut tracker = tracker(1.0);

    for i in 0..20 {
        let raw = jittered(truth, i, 2);
        let out = tracker.update(&[raw]);
        if i >= 3 {
            assert_eq!(out, vec![raw], "frame {}", i + 1);
        }
    }
}

#[test]
fn test_lower_alpha_never_increases_output_variance() {
    let truth = bbox(100, 100, 200, 160);
    let alphas = [1.0, 0.8, 0.6, 0.4, 0.2, 0.1];

    let variances: Vec<f64> = alphas
        .iter()
        .map(|&alpha| {
            let mut tracker = tracker(alpha);
            let outputs: Vec<BoundingBox> = (0..40)
                .filter_map(|i| tracker.update(&[jittered(truth, i, 4)]).first().copied())
                .skip(4)
                .collect();
            assert_eq!(outputs.len(), 33);
            coordinate_variance(&outputs)
        })
        .collect();

    for pair in variances.windows(2) {
        assert!(pair[1] <= pair[0], "variances not monotone: {variances:?}");
    }
    assert!(variances[0] > variances[5]);
}

// ── Full pipeline ──────────────────────────────────────────────────

struct ScriptedDetector {
    frames: Vec<Vec<BoundingBox>>,
    calls: usize,
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        let boxes = self.frames.get(self.calls).cloned().unwrap_or_default();
        self.calls += 1;
        Ok(boxes
            .iter()
            .map(|b| RawDetection {
                x1: b.x1() as f32,
                y1: b.y1() as f32,
                x2: b.x2() as f32,
                y2: b.y2() as f32,
                confidence: 0.9,
                class: DetectionClass::Document,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct NoFaces;

impl ObjectDetector for NoFaces {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "no-faces"
    }
}

struct RecordingBlurrer {
    calls: Arc<Mutex<Vec<Vec<BoundingBox>>>>,
}

impl FrameBlurrer for RecordingBlurrer {
    fn blur(&self, _frame: &mut Frame, boxes: &[BoundingBox]) -> Result<(), Box<dyn std::error::Error>> {
        self.calls.lock().unwrap().push(boxes.to_vec());
        Ok(())
    }
}

#[test]
fn test_pipeline_blurs_card_only_once_confirmed_and_through_dropouts() {
    let card = bbox(10, 10, 50, 30);
    // Seen for six frames, missed for three, seen again
    let script: Vec<Vec<BoundingBox>> = (0..12)
        .map(|i| {
            if (6..9).contains(&i) {
                Vec::new()
            } else {
                vec![jittered(card, i, 1)]
            }
        })
        .collect();

    let face_blurs = Arc::new(Mutex::new(Vec::new()));
    let document_blurs = Arc::new(Mutex::new(Vec::new()));
    let mut use_case = RedactFrameUseCase::new(
        Box::new(NoFaces),
        vec![Box::new(ScriptedDetector {
            frames: script,
            calls: 0,
        })],
        DocumentTracker::default(),
        RedactionRenderer::new(
            Box::new(RecordingBlurrer {
                calls: face_blurs.clone(),
            }),
            Box::new(RecordingBlurrer {
                calls: document_blurs.clone(),
            }),
            None,
        ),
        Box::new(JpegFrameCodec::default()),
        Box::new(NullPipelineLogger),
        PipelineOptions {
            document_upscale: 1.0,
            parallel: false,
            ..PipelineOptions::default()
        },
    );

    let counts: Vec<usize> = (0..12)
        .map(|i| {
            let frame = Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, 3, i);
            use_case.process(frame).unwrap().document_count
        })
        .collect();

    assert_eq!(counts, vec![0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1]);
    assert_eq!(document_blurs.lock().unwrap().len(), 9);
    assert!(face_blurs.lock().unwrap().iter().all(Vec::is_empty));
    assert_eq!(use_case.tracker().confirmed().len(), 1);
}
