//! Visual theme of a marksheet.
//!
//! Saved themes come from older versions of the application and may lack
//! keys, carry a partial `margins` object or hold values of the wrong type.
//! Deserialization is the single place where that is repaired: every missing
//! or malformed key takes its default, `margins` merges key-by-key, and the
//! resulting [`ThemeConfig`] is always fully populated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::style::Color;

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 10.0,
            right: 10.0,
            bottom: 10.0,
            left: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchoolNameAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl SchoolNameAlign {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct ThemeConfig {
    pub font_family: String,

    pub page_border_color: Color,
    /// Always within 0..=1.
    pub watermark_opacity: f32,
    pub margins: Margins,

    pub school_name_color: Color,
    /// In em of the base font size.
    pub school_name_size: f32,
    pub school_name_align: SchoolNameAlign,
    pub header_secondary_color: Color,

    pub session_badge_bg: Color,
    pub session_badge_color: Color,
    pub session_badge_size: f32,

    pub student_info_bg: Color,
    pub student_label_color: Color,
    pub student_value_color: Color,

    pub table_header_bg: Color,
    pub table_header_color: Color,
    pub table_border_color: Color,
    pub table_row_odd_bg: Color,
    pub table_row_even_bg: Color,
    pub grade_color: Color,

    pub result_pass_color: Color,
    pub result_fail_color: Color,
    /// Always positive.
    pub result_content_scale: f32,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            page_border_color: Color::rgb(0x1e, 0x29, 0x3b),
            watermark_opacity: 0.1,
            margins: Margins::default(),
            school_name_color: Color::rgb(0x0f, 0x17, 0x2a),
            school_name_size: 2.5,
            school_name_align: SchoolNameAlign::Center,
            header_secondary_color: Color::rgb(0x47, 0x55, 0x69),
            session_badge_bg: Color::rgb(0x0f, 0x17, 0x2a),
            session_badge_color: Color::WHITE,
            session_badge_size: 0.85,
            student_info_bg: Color::rgb(0xf8, 0xfa, 0xfc),
            student_label_color: Color::rgb(0x64, 0x74, 0x8b),
            student_value_color: Color::rgb(0x1e, 0x29, 0x3b),
            table_header_bg: Color::rgb(0xe2, 0xe8, 0xf0),
            table_header_color: Color::rgb(0x1e, 0x29, 0x3b),
            table_border_color: Color::rgb(0xcb, 0xd5, 0xe1),
            table_row_odd_bg: Color::WHITE,
            table_row_even_bg: Color::rgb(0xf8, 0xfa, 0xfc),
            grade_color: Color::rgb(0x1e, 0x29, 0x3b),
            result_pass_color: Color::rgb(0x05, 0x96, 0x69),
            result_fail_color: Color::rgb(0xdc, 0x26, 0x26),
            result_content_scale: 1.0,
        }
    }
}

impl ThemeConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Merge a saved theme object over the defaults.
    pub fn from_saved(value: &Map<String, Value>) -> Self {
        let mut theme = Self::default();

        let color = |key: &str, slot: &mut Color| {
            if let Some(c) = value.get(key).and_then(Value::as_str).and_then(Color::parse) {
                *slot = c;
            }
        };
        let number = |key: &str, slot: &mut f32| {
            if let Some(n) = value.get(key).and_then(Value::as_f64) {
                if n.is_finite() {
                    *slot = n as f32;
                }
            }
        };
        // Sizes and scales keep their default unless strictly positive.
        let size = |key: &str, slot: &mut f32| {
            if let Some(n) = value.get(key).and_then(Value::as_f64) {
                if n.is_finite() && n > 0.0 {
                    *slot = n as f32;
                }
            }
        };

        if let Some(family) = value.get("fontFamily").and_then(Value::as_str) {
            if !family.trim().is_empty() {
                theme.font_family = family.to_string();
            }
        }

        color("pageBorderColor", &mut theme.page_border_color);
        number("watermarkOpacity", &mut theme.watermark_opacity);
        theme.watermark_opacity = theme.watermark_opacity.clamp(0.0, 1.0);

        if let Some(margins) = value.get("margins").and_then(Value::as_object) {
            let side = |key: &str, slot: &mut f32| {
                if let Some(n) = margins.get(key).and_then(Value::as_f64) {
                    if n.is_finite() && n >= 0.0 {
                        *slot = n as f32;
                    }
                }
            };
            side("top", &mut theme.margins.top);
            side("right", &mut theme.margins.right);
            side("bottom", &mut theme.margins.bottom);
            side("left", &mut theme.margins.left);
        }

        color("schoolNameColor", &mut theme.school_name_color);
        size("schoolNameSize", &mut theme.school_name_size);
        if let Some(align) = value
            .get("schoolNameAlign")
            .and_then(Value::as_str)
            .and_then(SchoolNameAlign::parse)
        {
            theme.school_name_align = align;
        }
        color("headerSecondaryColor", &mut theme.header_secondary_color);

        color("sessionBadgeBg", &mut theme.session_badge_bg);
        color("sessionBadgeColor", &mut theme.session_badge_color);
        size("sessionBadgeSize", &mut theme.session_badge_size);

        color("studentInfoBg", &mut theme.student_info_bg);
        color("studentLabelColor", &mut theme.student_label_color);
        color("studentValueColor", &mut theme.student_value_color);

        color("tableHeaderBg", &mut theme.table_header_bg);
        color("tableHeaderColor", &mut theme.table_header_color);
        color("tableBorderColor", &mut theme.table_border_color);
        color("tableRowOddBg", &mut theme.table_row_odd_bg);
        color("tableRowEvenBg", &mut theme.table_row_even_bg);
        color("gradeColor", &mut theme.grade_color);

        color("resultPassColor", &mut theme.result_pass_color);
        color("resultFailColor", &mut theme.result_fail_color);
        size("resultContentScale", &mut theme.result_content_scale);

        theme
    }
}

impl From<Value> for ThemeConfig {
    fn from(value: Value) -> Self {
        match value.as_object() {
            Some(map) => Self::from_saved(map),
            None => {
                log::warn!("theme is not a JSON object; using the default theme");
                Self::default()
            }
        }
    }
}
