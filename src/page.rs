//! Page description – the intermediate representation between composition
//! and rasterization. A [`MarksheetPage`] encodes everything that ends up on
//! the page; rendering it needs no other input.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::Orientation;
use crate::style::{BoxStyle, Edges, TextStyle};

/// CSS pixels per millimetre (96 dpi).
pub const PX_PER_MM: f32 = 96.0 / 25.4;

/// A complete single-page marksheet ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarksheetPage {
    pub orientation: Orientation,
    /// Declared page size in millimetres.
    pub width_mm: f32,
    pub height_mm: f32,
    /// Inner page margins in millimetres.
    pub padding_mm: Edges,
    /// Root font size in CSS px; `em` sizes are resolved against it.
    pub base_font_size: f32,
    pub root: Node,
    /// Embedded images keyed by name, as base64 data URIs.
    pub resources: BTreeMap<String, String>,
    pub watermark: Option<Watermark>,
}

/// Overlay drawn centered over the finished page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Watermark {
    pub resource: String,
    pub opacity: f32,
    /// Width of the overlay relative to the page width.
    pub width_fraction: f32,
    pub grayscale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Block {
        style: BoxStyle,
        children: Vec<Node>,
    },
    Text {
        text: String,
        style: TextStyle,
    },
    /// An embedded image drawn object-contain inside a fixed box (CSS px).
    Image {
        resource: String,
        width: f32,
        height: f32,
    },
}

impl Node {
    pub fn block(style: BoxStyle, children: Vec<Node>) -> Self {
        Node::Block { style, children }
    }

    pub fn text(text: impl Into<String>, style: TextStyle) -> Self {
        Node::Text {
            text: text.into(),
            style,
        }
    }

    pub fn image(resource: impl Into<String>, width: f32, height: f32) -> Self {
        Node::Image {
            resource: resource.into(),
            width,
            height,
        }
    }

    /// Depth-first visit of every node.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        if let Node::Block { children, .. } = self {
            for child in children {
                child.walk(f);
            }
        }
    }

    /// Concatenated text of the subtree, one entry per text node.
    pub fn texts(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |n| {
            if let Node::Text { text, .. } = n {
                out.push(text.as_str());
            }
        });
        out
    }
}

impl MarksheetPage {
    pub fn width_px(&self) -> f32 {
        self.width_mm * PX_PER_MM
    }

    pub fn height_px(&self) -> f32 {
        self.height_mm * PX_PER_MM
    }

    /// Every resource name the page refers to, tree and watermark included.
    pub fn referenced_resources(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.root.walk(&mut |n| {
            if let Node::Image { resource, .. } = n {
                names.push(resource.as_str());
            }
        });
        if let Some(w) = &self.watermark {
            names.push(w.resource.as_str());
        }
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
