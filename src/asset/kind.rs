//! Asset kind definitions.

use std::path::Path;

/// Kind of static asset, classified by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// CSS stylesheets.
    Stylesheet,
    /// JavaScript sources.
    Script,
    /// Raster/vector images.
    Image,
    /// Web font formats.
    Font,
    /// HTML documents.
    Markup,
    /// Anything else.
    Other,
}

impl AssetKind {
    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(path.extension().and_then(|e| e.to_str()))
    }

    /// Classify an extension string (case-insensitive).
    pub fn from_extension(ext: Option<&str>) -> Self {
        let Some(ext) = ext else {
            return Self::Other;
        };
        match ext.to_ascii_lowercase().as_str() {
            "css" => Self::Stylesheet,
            "js" | "mjs" | "cjs" => Self::Script,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" => Self::Image,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            "html" | "htm" => Self::Markup,
            _ => Self::Other,
        }
    }

    /// Whether this kind holds text that may reference other assets.
    pub fn is_text_reference_holder(self) -> bool {
        matches!(self, Self::Stylesheet | Self::Script | Self::Markup)
    }

    /// Counter label for the build progress line.
    pub fn label(self) -> &'static str {
        match self {
            Self::Stylesheet => "styles",
            Self::Script => "scripts",
            Self::Image => "images",
            Self::Font => "fonts",
            Self::Markup => "html",
            Self::Other => "other",
        }
    }
}
