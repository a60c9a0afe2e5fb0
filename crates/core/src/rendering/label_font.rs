use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontVec;

use crate::shared::constants::FALLBACK_FONT_PATHS;

/// Load the font used for label text.
///
/// A configured path is tried first, then the well-known system fonts. Returns
/// `None` when nothing loads; labels are then drawn without glyphs.
pub fn load_label_font(configured: Option<&Path>) -> Option<FontVec> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FALLBACK_FONT_PATHS.iter().map(PathBuf::from));

    for path in candidates {
        if !path.exists() {
            if Some(path.as_path()) == configured {
                log::warn!("Configured label font {} does not exist", path.display());
            }
            continue;
        }
        match read_font(&path) {
            Ok(font) => {
                log::debug!("Using label font {}", path.display());
                return Some(font);
            }
            Err(e) => log::warn!("Skipping label font {}: {e}", path.display()),
        }
    }
    None
}

fn read_font(path: &Path) -> Result<FontVec, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    Ok(FontVec::try_from_vec(bytes)?)
}
