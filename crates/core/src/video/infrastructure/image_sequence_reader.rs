use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::video::domain::frame_reader::{EncodedFrame, FrameReader};

/// Treats a list of image files as the frames of one stream.
///
/// Directories are expanded to the image files they contain, sorted by file
/// name; explicit files are kept in the order given.
pub struct ImageSequenceReader {
    paths: Vec<PathBuf>,
}

impl ImageSequenceReader {
    pub fn open(inputs: &[PathBuf]) -> Result<Self, Box<dyn std::error::Error>> {
        let mut paths = Vec::new();
        for input in inputs {
            if input.is_dir() {
                let mut entries: Vec<PathBuf> = fs::read_dir(input)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && is_image(p))
                    .collect();
                entries.sort();
                log::debug!("{}: {} frames", input.display(), entries.len());
                paths.extend(entries);
            } else if input.is_file() {
                paths.push(input.clone());
            } else {
                return Err(format!("input not found: {}", input.display()).into());
            }
        }
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn frame_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl FrameReader for ImageSequenceReader {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<EncodedFrame, Box<dyn std::error::Error>>> + '_> {
        Box::new(
            self.paths
                .iter()
                .enumerate()
                .map(|(index, path)| read_frame(index, path)),
        )
    }
}

fn read_frame(index: usize, path: &Path) -> Result<EncodedFrame, Box<dyn std::error::Error>> {
    let bytes = fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(EncodedFrame {
        index,
        name: frame_name(path),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_directory_frames_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "frame_003.jpg", b"c");
        touch(tmp.path(), "frame_001.jpg", b"a");
        touch(tmp.path(), "frame_002.PNG", b"b");
        touch(tmp.path(), "notes.txt", b"skip");

        let mut reader = ImageSequenceReader::open(&[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(reader.len(), 3);

        let frames: Vec<EncodedFrame> = reader.frames().map(|f| f.unwrap()).collect();
        let names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["frame_001.jpg", "frame_002.PNG", "frame_003.jpg"]);
        assert_eq!(frames[1].bytes, b"b");
        assert_eq!(frames[2].index, 2);
    }

    #[test]
    fn test_explicit_files_keep_given_order() {
        let tmp = TempDir::new().unwrap();
        let b = touch(tmp.path(), "b.jpg", b"b");
        let a = touch(tmp.path(), "a.jpg", b"a");

        let mut reader = ImageSequenceReader::open(&[b, a]).unwrap();
        let names: Vec<String> = reader.frames().map(|f| f.unwrap().name).collect();
        assert_eq!(names, vec!["b.jpg", "a.jpg"]);
    }

    #[test]
    fn test_missing_input_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(ImageSequenceReader::open(&[tmp.path().join("nope.jpg")]).is_err());
    }

    #[test]
    fn test_file_removed_after_open_yields_error_item() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "a.jpg", b"a");
        let b = touch(tmp.path(), "b.jpg", b"b");
        let mut reader = ImageSequenceReader::open(&[a.clone(), b]).unwrap();
        fs::remove_file(&a).unwrap();

        let results: Vec<_> = reader.frames().collect();
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().bytes, b"b");
    }

    #[test]
    fn test_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let reader = ImageSequenceReader::open(&[tmp.path().to_path_buf()]).unwrap();
        assert!(reader.is_empty());
    }
}
