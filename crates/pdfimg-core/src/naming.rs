//! Deterministic names for written images.

use std::fmt;
use std::path::Path;

use crate::models::image::NormalizedImage;

/// Base name of a source document: the last path segment without its extension.
///
/// `scans/2024/report.PDF` becomes `report`.
pub fn document_base_name(source_name: &str) -> String {
    let last_segment = source_name.rsplit('/').next().unwrap_or(source_name);
    Path::new(last_segment)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(last_segment)
        .to_string()
}

/// Name of one written image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    /// Document base name.
    pub base: String,
    /// 1-based page number.
    pub page: u32,
    /// 1-based image counter, running across the whole document.
    pub index: u32,
}

impl OutputName {
    pub fn new(base: impl Into<String>, page: u32, index: u32) -> Self {
        Self {
            base: base.into(),
            page,
            index,
        }
    }

    /// File name with the output extension.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, NormalizedImage::EXTENSION)
    }

    /// Object key under `dir`; slashes around `dir` are ignored.
    pub fn object_key(&self, dir: &str) -> String {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            self.file_name()
        } else {
            format!("{}/{}", dir, self.file_name())
        }
    }
}

impl fmt::Display for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_page_{}_img_{}", self.base, self.page, self.index)
    }
}
