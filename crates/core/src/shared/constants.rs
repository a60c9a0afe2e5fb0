pub const FACE_MODEL_NAME: &str = "yolov8n-face-lindevs.onnx";

/// Document (ID card) models; the first is required, later ones are optional.
pub const DOCUMENT_MODEL_NAMES: &[&str] = &["best.onnx", "best2.onnx"];

pub const DEFAULT_MODEL_DIR: &str = "models";

/// Application directory name under the platform config/cache directories.
pub const APP_DIR_NAME: &str = "FrameSafe";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Fonts tried, in order, for label text when none is configured.
pub const FALLBACK_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];
