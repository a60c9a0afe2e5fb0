use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde::Serialize;

use framesafe_core::blurring::infrastructure::cpu_box_blurrer::CpuBoxBlurrer;
use framesafe_core::detection::domain::document_tracker::DocumentTracker;
use framesafe_core::detection::domain::object_detector::{DetectionClass, ObjectDetector};
use framesafe_core::detection::infrastructure::model_resolver;
use framesafe_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use framesafe_core::pipeline::infrastructure::latest_frame_executor::{
    FrameOutcome, LatestFrameExecutor,
};
use framesafe_core::pipeline::pipeline_logger::StatsPipelineLogger;
use framesafe_core::pipeline::redact_frame_use_case::{PipelineOptions, RedactFrameUseCase};
use framesafe_core::rendering::label_font::load_label_font;
use framesafe_core::rendering::redaction_renderer::RedactionRenderer;
use framesafe_core::shared::config::RedactionConfig;
use framesafe_core::video::domain::frame_codec::FrameCodec;
use framesafe_core::video::domain::frame_reader::FrameReader;
use framesafe_core::video::domain::image_writer::ImageWriter;
use framesafe_core::video::infrastructure::image_file_writer::ImageFileWriter;
use framesafe_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;
use framesafe_core::video::infrastructure::jpeg_frame_codec::JpegFrameCodec;

/// Blur bystander faces and ID documents in a sequence of video frames.
///
/// The largest face in each frame is kept visible and outlined; every other
/// face and every ID card is blurred.
#[derive(Parser)]
#[command(name = "framesafe")]
struct Cli {
    /// Image files or directories of frames, processed in order as one stream.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for redacted frames.
    #[arg(short, long, default_value = "redacted")]
    output_dir: PathBuf,

    /// JSON configuration file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing the ONNX models.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    face_confidence: Option<f32>,

    /// ID card detection confidence threshold (0.0-1.0).
    #[arg(long)]
    document_confidence: Option<f32>,

    /// Upscale factor applied before ID card detection.
    #[arg(long)]
    upscale: Option<f64>,

    /// IoU above which two document boxes are the same card.
    #[arg(long)]
    iou_threshold: Option<f64>,

    /// Consecutive frames before an ID card is blurred.
    #[arg(long)]
    confirm_frames: Option<u32>,

    /// Frames an ID card stays blurred after it was last seen.
    #[arg(long)]
    forget_frames: Option<u32>,

    /// Weight of the newest detection when smoothing card boxes (0-1].
    #[arg(long)]
    smooth_alpha: Option<f64>,

    /// TrueType font for box labels.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Drop frames the pipeline cannot keep up with, like a live feed.
    #[arg(long)]
    realtime: bool,

    /// Print one JSON report per frame on stdout.
    #[arg(long)]
    json: bool,
}

/// Per-frame line printed with `--json`.
#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
enum FrameReport<'a> {
    Ok {
        frame: &'a str,
        faces: usize,
        ids: usize,
    },
    Error {
        frame: &'a str,
        message: String,
    },
}

impl FrameReport<'_> {
    fn print(&self, json: bool) {
        if json {
            match serde_json::to_string(self) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("Failed to serialize report: {e}"),
            }
            return;
        }
        match self {
            FrameReport::Ok { frame, faces, ids } => {
                println!("{frame}: {faces} faces, {ids} ID cards")
            }
            FrameReport::Error { frame, message } => println!("{frame}: error: {message}"),
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = RedactionConfig::load_or_default(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config);
    config.validate()?;

    let mut reader = ImageSequenceReader::open(&cli.inputs)?;
    if reader.is_empty() {
        return Err("No image frames found in the given inputs".into());
    }
    log::info!("Processing {} frames", reader.len());

    let use_case = build_use_case(&config)?.with_total_frames(reader.len());
    let writer = ImageFileWriter::new();
    let codec = JpegFrameCodec::new(config.output.jpeg_quality);

    if cli.realtime {
        run_realtime(&cli, &mut reader, use_case, &codec, &writer)
    } else {
        run_sequential(&cli, &mut reader, use_case, &writer)
    }
}

fn run_sequential(
    cli: &Cli,
    reader: &mut dyn FrameReader,
    mut use_case: RedactFrameUseCase,
    writer: &dyn ImageWriter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut outputs = OutputNames::new(&cli.output_dir);
    let mut failed = 0;
    for (position, item) in reader.frames().enumerate() {
        let encoded = match item {
            Ok(encoded) => encoded,
            Err(e) => {
                failed += 1;
                let name = format!("#{position}");
                FrameReport::Error {
                    frame: &name,
                    message: e.to_string(),
                }
                .print(cli.json);
                continue;
            }
        };

        let report = match use_case.process_encoded(&encoded.bytes, encoded.index) {
            Ok(result) => {
                let path = outputs.path_for(&encoded.name, encoded.index);
                writer.write(&path, &result.encoded)?;
                FrameReport::Ok {
                    frame: &encoded.name,
                    faces: result.face_count,
                    ids: result.document_count,
                }
            }
            Err(e) => {
                failed += 1;
                FrameReport::Error {
                    frame: &encoded.name,
                    message: e.to_string(),
                }
            }
        };
        report.print(cli.json);
    }

    use_case.log_summary();
    if failed > 0 {
        log::warn!("{failed} frames failed");
    }
    log::info!("Output written to {}", cli.output_dir.display());
    Ok(())
}

fn run_realtime(
    cli: &Cli,
    reader: &mut dyn FrameReader,
    use_case: RedactFrameUseCase,
    codec: &dyn FrameCodec,
    writer: &dyn ImageWriter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut executor = LatestFrameExecutor::spawn(use_case);
    let results = executor.results();
    let mut outputs = OutputNames::new(&cli.output_dir);
    let mut pending = PendingNames::default();

    for (position, item) in reader.frames().enumerate() {
        let decoded = item.and_then(|encoded| {
            let frame = codec.decode(&encoded.bytes, encoded.index)?;
            pending.insert(encoded.index, encoded.name);
            Ok(frame)
        });
        match decoded {
            Ok(frame) => executor.submit(frame)?,
            Err(e) => FrameReport::Error {
                frame: &format!("#{position}"),
                message: e.to_string(),
            }
            .print(cli.json),
        }

        for outcome in results.try_iter() {
            emit_outcome(cli, outcome, &mut pending, &mut outputs, codec, writer)?;
        }
    }

    let stats = executor.finish()?;
    for outcome in results.try_iter() {
        emit_outcome(cli, outcome, &mut pending, &mut outputs, codec, writer)?;
    }

    log::info!(
        "Processed {} frames, dropped {} stale frames",
        stats.processed,
        stats.dropped
    );
    log::info!("Output written to {}", cli.output_dir.display());
    Ok(())
}

fn emit_outcome(
    cli: &Cli,
    outcome: FrameOutcome,
    pending: &mut PendingNames,
    outputs: &mut OutputNames,
    codec: &dyn FrameCodec,
    writer: &dyn ImageWriter,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = pending.take(outcome.index);

    let encoded = outcome
        .result
        .and_then(|redacted| Ok((codec.encode(&redacted.frame)?, redacted)));
    let report = match encoded {
        Ok((bytes, redacted)) => {
            writer.write(&outputs.path_for(&name, outcome.index), &bytes)?;
            FrameReport::Ok {
                frame: &name,
                faces: redacted.face_count,
                ids: redacted.document_count,
            }
        }
        Err(e) => FrameReport::Error {
            frame: &name,
            message: e.to_string(),
        },
    };
    report.print(cli.json);
    Ok(())
}

fn apply_overrides(cli: &Cli, config: &mut RedactionConfig) {
    if let Some(dir) = &cli.model_dir {
        config.models.model_dir = dir.clone();
    }
    if let Some(v) = cli.face_confidence {
        config.detection.face_confidence = v;
    }
    if let Some(v) = cli.document_confidence {
        config.detection.document_confidence = v;
    }
    if let Some(v) = cli.upscale {
        config.detection.document_upscale = v;
    }
    if let Some(v) = cli.iou_threshold {
        config.tracking.iou_threshold = v;
    }
    if let Some(v) = cli.confirm_frames {
        config.tracking.confirm_frames = v;
    }
    if let Some(v) = cli.forget_frames {
        config.tracking.forget_frames = v;
    }
    if let Some(v) = cli.smooth_alpha {
        config.tracking.smooth_alpha = v;
    }
    if let Some(font) = &cli.font {
        config.output.font_path = Some(font.clone());
    }
}

fn build_use_case(
    config: &RedactionConfig,
) -> Result<RedactFrameUseCase, Box<dyn std::error::Error>> {
    let (face_detector, document_detectors) = build_detectors(config)?;

    let renderer = RedactionRenderer::new(
        Box::new(CpuBoxBlurrer::new(
            config.blur.face_kernel,
            config.blur.face_sigma,
        )),
        Box::new(CpuBoxBlurrer::new(
            config.blur.document_kernel,
            config.blur.document_sigma,
        )),
        load_label_font(config.output.font_path.as_deref()),
    );

    Ok(RedactFrameUseCase::new(
        face_detector,
        document_detectors,
        DocumentTracker::new(config.tracking),
        renderer,
        Box::new(JpegFrameCodec::new(config.output.jpeg_quality)),
        Box::new(StatsPipelineLogger::default()),
        PipelineOptions::from(&config.detection),
    ))
}

type Detectors = (Box<dyn ObjectDetector>, Vec<Box<dyn ObjectDetector>>);

fn build_detectors(config: &RedactionConfig) -> Result<Detectors, Box<dyn std::error::Error>> {
    let models = &config.models;
    let detection = &config.detection;

    log::info!("Resolving model: {}", models.face_model);
    let face_path = model_resolver::resolve(
        &models.face_model,
        &models.model_dir,
        models.face_model_url.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    let face_detector: Box<dyn ObjectDetector> = Box::new(OnnxYoloDetector::new(
        &face_path,
        DetectionClass::Face,
        1,
        detection.face_confidence,
        detection.process_size,
    )?);

    let mut document_detectors: Vec<Box<dyn ObjectDetector>> = Vec::new();
    for (i, name) in models.document_models.iter().enumerate() {
        let path = match model_resolver::resolve(name, &models.model_dir, None, None) {
            Ok(path) => path,
            // Only the first document model is required
            Err(e) if i > 0 => {
                log::info!("Optional document model {name} not loaded: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        document_detectors.push(Box::new(OnnxYoloDetector::new(
            &path,
            DetectionClass::Document,
            detection.document_classes,
            detection.document_confidence,
            detection.process_size,
        )?));
    }

    Ok((face_detector, document_detectors))
}

/// Names of frames handed to the realtime worker and not yet reported.
#[derive(Default)]
struct PendingNames {
    names: BTreeMap<usize, String>,
}

impl PendingNames {
    fn insert(&mut self, index: usize, name: String) {
        self.names.insert(index, name);
    }

    /// Name of frame `index`. Earlier frames still pending were dropped by
    /// the worker and are forgotten.
    fn take(&mut self, index: usize) -> String {
        let name = self
            .names
            .remove(&index)
            .unwrap_or_else(|| format!("#{index}"));
        let before = self.names.len();
        self.names.retain(|&i, _| i > index);
        let dropped = before - self.names.len();
        if dropped > 0 {
            log::debug!("{dropped} frames before #{index} were dropped");
        }
        name
    }
}

/// Assigns each written frame a distinct `<stem>.jpg` in the output
/// directory. A stem already used (`a.png` after `a.jpg`, or one file name
/// in two input directories) gets the frame index appended.
struct OutputNames {
    dir: PathBuf,
    taken: HashSet<String>,
}

impl OutputNames {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            taken: HashSet::new(),
        }
    }

    fn path_for(&mut self, frame_name: &str, index: usize) -> PathBuf {
        let stem = Path::new(frame_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("frame-{index}"));

        let mut file = format!("{stem}.jpg");
        let mut attempt = 0;
        while !self.taken.insert(file.clone()) {
            attempt += 1;
            file = if attempt == 1 {
                format!("{stem}-{index}.jpg")
            } else {
                format!("{stem}-{index}-{attempt}.jpg")
            };
        }
        if attempt > 0 {
            log::warn!("{frame_name}: output name already used, writing {file}");
        }
        self.dir.join(file)
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
