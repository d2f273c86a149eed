/// Asset lookup for export templates
use std::fs;
use std::path::PathBuf;

/// Page template used by the SVG export
pub const PAGE_TEMPLATE: &str = "musicStrip.svg";

/// Two blank strip columns with a title block above the first one
const BUILTIN_PAGE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="383" height="570" viewBox="0 0 383 570">
<rect x="57.424" y="64.610" width="113.460" height="480.314" fill="none" stroke="#999999" stroke-width="0.5"/>
<rect x="212.441" y="4.098" width="113.460" height="548.390" fill="none" stroke="#999999" stroke-width="0.5"/>
<text x="114.154" y="40" font-size="12" text-anchor="middle" font-family="serif">Music Box</text>
</svg>
"##;

/// Source of named text assets
pub trait AssetStore {
    fn load_text(&self, name: &str) -> Option<String>;
}

/// Looks in asset directories first, then in the assets built into the binary
#[derive(Debug, Clone)]
pub struct Assets {
    dirs: Vec<PathBuf>,
    builtin: bool,
}

impl Assets {
    /// Built-in assets only
    pub fn new() -> Self {
        Self {
            dirs: Vec::new(),
            builtin: true,
        }
    }

    /// Nothing at all, every lookup misses
    pub fn empty() -> Self {
        Self {
            dirs: Vec::new(),
            builtin: false,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    fn builtin_text(name: &str) -> Option<&'static str> {
        match name {
            PAGE_TEMPLATE => Some(BUILTIN_PAGE),
            _ => None,
        }
    }
}

impl Default for Assets {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStore for Assets {
    fn load_text(&self, name: &str) -> Option<String> {
        for dir in &self.dirs {
            let path = dir.join(name);
            match fs::read_to_string(&path) {
                Ok(text) => return Some(text),
                Err(err) => log::trace!("Asset {:?} not readable: {}", path, err),
            }
        }
        if self.builtin {
            if let Some(text) = Self::builtin_text(name) {
                return Some(text.to_string());
            }
        }
        log::debug!("Failed to find asset file {:?}", name);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_template() {
        let template = Assets::new().load_text(PAGE_TEMPLATE).unwrap();
        assert!(template.trim_end().ends_with("</svg>"));
        assert!(Assets::new().load_text("missing.svg").is_none());
        assert!(Assets::empty().load_text(PAGE_TEMPLATE).is_none());
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PAGE_TEMPLATE), "<svg>custom</svg>").unwrap();
        let assets = Assets::new().with_dir(dir.path());
        assert_eq!(
            assets.load_text(PAGE_TEMPLATE).as_deref(),
            Some("<svg>custom</svg>")
        );
    }
}
