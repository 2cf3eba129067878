//! Export settings, loadable from a JSON file. Every key is optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RecordsError;

fn default_single_font_size() -> f32 {
    18.0
}

fn default_bulk_font_size() -> f32 {
    12.0
}

fn default_supersample() -> f32 {
    crate::renderer::DEFAULT_SUPERSAMPLE
}

fn default_batch_size() -> usize {
    50
}

fn default_max_batch_size() -> usize {
    100
}

fn default_document_title() -> String {
    "Marksheet".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Base font size for single-student export.
    #[serde(default = "default_single_font_size")]
    pub single_font_size: f32,
    /// Base font size for batch export.
    #[serde(default = "default_bulk_font_size")]
    pub bulk_font_size: f32,
    #[serde(default = "default_supersample")]
    pub supersample: f32,
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Look up fonts installed on the system instead of greeking text.
    #[serde(default)]
    pub system_fonts: bool,
    #[serde(default = "default_document_title")]
    pub document_title: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            single_font_size: default_single_font_size(),
            bulk_font_size: default_bulk_font_size(),
            supersample: default_supersample(),
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
            system_fonts: false,
            document_title: default_document_title(),
        }
    }
}

impl ExportSettings {
    pub fn from_json(json: &str) -> Result<Self, RecordsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, RecordsError> {
        let json = fs::read_to_string(path).map_err(|source| RecordsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
