//! Font loading and text measurement using `ttf-parser`.
//!
//! The manager starts with Helvetica-like heuristic metrics so layout works
//! without any font files. Real faces (regular and bold) can be loaded from
//! bytes or discovered among the system fonts; once loaded, glyph advances
//! drive measurement and glyph outlines drive painting.

use crate::error::RenderError;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    /// Face index inside a collection.
    pub index: u32,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

impl FontData {
    fn parse(bytes: Vec<u8>, index: u32) -> Result<Self, RenderError> {
        let face = ttf_parser::Face::parse(&bytes, index)
            .map_err(|e| RenderError::Font(e.to_string()))?;
        Ok(Self {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            index,
            bytes,
        })
    }

    pub fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.bytes, self.index).ok()
    }
}

/// Families tried, in order, when discovering system fonts.
const SYSTEM_FAMILIES: [&str; 4] = ["Inter", "Liberation Sans", "DejaVu Sans", "Arial"];

/// Manages the regular and bold faces used for every text run.
#[derive(Clone, Default)]
pub struct FontManager {
    regular: Option<FontData>,
    bold: Option<FontData>,
}

impl FontManager {
    /// A manager with heuristic metrics only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF face from bytes.
    pub fn load_font(&mut self, bold: bool, bytes: Vec<u8>) -> Result<(), RenderError> {
        let data = FontData::parse(bytes, 0)?;
        if bold {
            self.bold = Some(data);
        } else {
            self.regular = Some(data);
        }
        Ok(())
    }

    /// Discover a sans-serif regular and bold face among the system fonts,
    /// preferring `family`. Returns whether a regular face was found.
    pub fn load_system_fonts(&mut self, family: &str) -> bool {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        log::debug!("font database holds {} faces", db.len());

        let mut families = vec![fontdb::Family::Name(family)];
        families.extend(SYSTEM_FAMILIES.iter().map(|f| fontdb::Family::Name(f)));
        families.push(fontdb::Family::SansSerif);

        for (bold, weight) in [(false, fontdb::Weight::NORMAL), (true, fontdb::Weight::BOLD)] {
            let query = fontdb::Query {
                families: &families,
                weight,
                stretch: fontdb::Stretch::Normal,
                style: fontdb::Style::Normal,
            };
            let Some(id) = db.query(&query) else {
                continue;
            };
            let loaded = db
                .with_face_data(id, |data, index| FontData::parse(data.to_vec(), index))
                .transpose();
            match loaded {
                Ok(Some(data)) => {
                    if bold {
                        self.bold = Some(data);
                    } else {
                        self.regular = Some(data);
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("skipping system font: {e}"),
            }
        }

        if self.regular.is_none() {
            log::warn!("no usable system font found; text will be greeked");
        }
        self.regular.is_some()
    }

    /// Face for a weight. Bold falls back to regular.
    pub fn face_data(&self, bold: bool) -> Option<&FontData> {
        if bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref()
        }
    }

    pub fn has_real_fonts(&self) -> bool {
        self.regular.is_some()
    }

    /// Measure the width of a string at a given font size (in px).
    /// Without a loaded face an average character width is assumed
    /// (0.5 × font_size, 10 % wider for bold).
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        let face = self.face_data(bold).and_then(|d| d.face().map(|f| (d, f)));
        let Some((data, face)) = face else {
            let avg = if bold { 0.55 } else { 0.5 };
            return text.chars().count() as f32 * font_size * avg;
        };

        let scale = font_size / data.units_per_em;
        text.chars()
            .map(|ch| match face.glyph_index(ch) {
                Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                None => font_size * 0.5,
            })
            .sum()
    }

    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Distance from the top of the em box to the baseline, in px.
    pub fn ascender_px(&self, font_size: f32, bold: bool) -> f32 {
        match self.face_data(bold) {
            Some(d) => {
                let total = d.ascender - d.descender;
                if total > 0.0 {
                    font_size * d.ascender / total
                } else {
                    font_size * 0.75
                }
            }
            None => font_size * 0.75,
        }
    }
}

/// Word-wrap text to fit within `max_width` pixels. Explicit newlines always
/// break. Returns at least one line.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            let w = fonts.measure_text_width(&candidate, font_size, bold);
            if w > max_width && !current_line.is_empty() {
                lines.push(current_line);
                current_line = word.to_string();
            } else {
                current_line = candidate;
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::new();
        // 5 chars × 16 × 0.5 = 40
        assert!((mgr.measure_text_width("Hello", 16.0, false) - 40.0).abs() < 0.1);
        assert!((mgr.measure_text_width("Hello", 16.0, true) - 44.0).abs() < 0.1);
        assert!(!mgr.has_real_fonts());
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::new();
        let lines = wrap_text("Hello world foo bar", 16.0, false, 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
    }

    #[test]
    fn explicit_newlines_break() {
        let mgr = FontManager::new();
        let lines = wrap_text("ABCD\nEF01\n2345", 14.0, true, 500.0, &mgr);
        assert_eq!(lines, vec!["ABCD", "EF01", "2345"]);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let mut mgr = FontManager::new();
        let err = mgr.load_font(false, vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, RenderError::Font(_)));
        assert!(!mgr.has_real_fonts());
    }
}
