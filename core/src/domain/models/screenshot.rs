//! The `Screenshot` entity: an opaque image bound to a task.

use serde::{Deserialize, Serialize};

/// Image format detected from the uploaded filename's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Detect the format from a filename's suffix. `None` for anything
    /// else; callers decide whether that's an error.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A screenshot uploaded by a runner for a given task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: i64,
    pub task: i64,
    /// Wall-clock time set on insertion, seconds since epoch.
    pub timestamp: u64,
    pub file_name: String,
    #[serde(skip_serializing, default)]
    pub bytes: Vec<u8>,
}

impl Screenshot {
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_file_name(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_png_and_jpeg() {
        assert_eq!(ImageFormat::from_file_name("shot.png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_file_name("shot.PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_file_name("shot.jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_file_name("shot.jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_file_name("shot.gif"), None);
    }

    #[test]
    fn mime_types_match_spec() {
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
    }
}
