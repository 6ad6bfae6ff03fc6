//! Classification of source files by name.

use serde::Serialize;

use crate::config::ImageConfig;

/// Case-insensitive keyword that marks a file as a boardview.
const BOARDVIEW_KEYWORD: &str = "boardview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Boardview,
    Schematic,
}

impl Category {
    pub fn from_file_name(file_name: &str) -> Self {
        if file_name.to_lowercase().contains(BOARDVIEW_KEYWORD) {
            Category::Boardview
        } else {
            Category::Schematic
        }
    }

    /// Label for the download button in the post body.
    pub fn download_label(self) -> &'static str {
        match self {
            Category::Boardview => "Download Boardview",
            Category::Schematic => "Download Schematic",
        }
    }

    /// Site-relative path of the fallback preview image.
    pub fn fallback_image<'c>(self, images: &'c ImageConfig) -> &'c str {
        match self {
            Category::Boardview => &images.boardview,
            Category::Schematic => &images.schematic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boardview_keyword_matches_in_any_case() {
        for name in ["GPU-boardview-x.bin", "BOARDVIEW.brd", "Lenovo_BoardView_T480.tvw"] {
            assert_eq!(Category::from_file_name(name), Category::Boardview, "{name}");
        }
    }

    #[test]
    fn anything_else_is_a_schematic() {
        for name in ["x.bin", "board-view.pdf", ""] {
            assert_eq!(Category::from_file_name(name), Category::Schematic, "{name}");
        }
    }

    #[test]
    fn labels_and_images_follow_category() {
        let images = ImageConfig {
            boardview: "bv.jpg".into(),
            schematic: "sch.jpg".into(),
        };
        assert_eq!(Category::Boardview.download_label(), "Download Boardview");
        assert_eq!(Category::Schematic.download_label(), "Download Schematic");
        assert_eq!(Category::Boardview.fallback_image(&images), "bv.jpg");
        assert_eq!(Category::Schematic.fallback_image(&images), "sch.jpg");
    }
}
