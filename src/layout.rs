//! Layout engine – uses Taffy to compute flexbox layout for a page
//! description, then converts the result into a flat list of positioned boxes
//! in paint order.
//!
//! All coordinates are CSS px with the origin at the page's top-left corner.

use std::collections::HashMap;

use taffy::prelude::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style, TaffyTree,
};

use crate::error::RenderError;
use crate::fonts::{wrap_text, FontManager};
use crate::page::{MarksheetPage, Node, PX_PER_MM};
use crate::style::{self, BoxStyle, Color, Dimension, Direction, Edges, TextAlign, TextStyle};

/// A page after layout.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub width: f32,
    /// At least the declared page height; taller when the content overflows.
    pub height: f32,
    /// Positioned boxes in paint order (parents before children).
    pub boxes: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content: BoxContent,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    Decoration {
        background: Color,
        border: Edges,
        border_color: Color,
    },
    Text {
        lines: Vec<TextLine>,
        style: TextStyle,
    },
    Image {
        resource: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// X offset within the box (for alignment).
    pub x_offset: f32,
    /// Y offset of the line's top from the top of the box.
    pub y_offset: f32,
}

/// What a taffy node stands for, recorded at build time.
enum NodeContent {
    Block(BoxStyle),
    Text {
        lines: Vec<(String, f32)>,
        style: TextStyle,
    },
    Image(String),
}

// ---------------------------------------------------------------------------
// Build Taffy tree from page nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    content: HashMap<NodeId, NodeContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            content: HashMap::new(),
        }
    }

    /// `slot` is the estimated outer width the node will occupy; it decides
    /// where text wraps.
    fn build_node(&mut self, node: &Node, slot: f32) -> Result<NodeId, RenderError> {
        match node {
            Node::Block { style, children } => self.build_block(style, children, slot),
            Node::Text { text, style } => self.build_text(text, style, slot),
            Node::Image {
                resource,
                width,
                height,
            } => {
                let id = self.taffy.new_leaf(Style {
                    size: Size {
                        width: taffy::Dimension::Length(*width),
                        height: taffy::Dimension::Length(*height),
                    },
                    flex_shrink: 0.0,
                    ..Default::default()
                })?;
                self.content.insert(id, NodeContent::Image(resource.clone()));
                Ok(id)
            }
        }
    }

    fn build_text(
        &mut self,
        text: &str,
        style: &TextStyle,
        slot: f32,
    ) -> Result<NodeId, RenderError> {
        let bold = style.is_bold();
        let lines = wrap_text(text, style.font_size, bold, slot, self.fonts);
        let measured: Vec<(String, f32)> = lines
            .into_iter()
            .map(|l| {
                let w = self.fonts.measure_text_width(&l, style.font_size, bold);
                (l, w)
            })
            .collect();

        let text_width = measured.iter().map(|(_, w)| *w).fold(0.0f32, f32::max);
        let text_height =
            measured.len() as f32 * self.fonts.line_height_px(style.font_size, style.line_height);

        // Width stays auto so a stretching parent can widen the box for
        // alignment; the measured width is the floor.
        let id = self.taffy.new_leaf(Style {
            size: Size {
                width: taffy::Dimension::Auto,
                height: taffy::Dimension::Length(text_height),
            },
            min_size: Size {
                width: taffy::Dimension::Length(text_width.ceil()),
                height: taffy::Dimension::Auto,
            },
            flex_shrink: 0.0,
            ..Default::default()
        })?;
        self.content.insert(
            id,
            NodeContent::Text {
                lines: measured,
                style: style.clone(),
            },
        );
        Ok(id)
    }

    fn build_block(
        &mut self,
        style: &BoxStyle,
        children: &[Node],
        slot: f32,
    ) -> Result<NodeId, RenderError> {
        let own_width = style
            .width
            .resolve(slot)
            .unwrap_or(slot - style.margin.horizontal());
        let inner_width =
            (own_width - style.padding.horizontal() - style.border.horizontal()).max(1.0);

        let slots = match style.direction {
            Direction::Column => vec![inner_width; children.len()],
            Direction::Row => row_slots(children, inner_width, style.gap),
        };

        let child_ids = children
            .iter()
            .zip(slots)
            .map(|(child, slot)| self.build_node(child, slot))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self
            .taffy
            .new_with_children(box_to_taffy(style), &child_ids)?;
        self.content.insert(id, NodeContent::Block(style.clone()));
        Ok(id)
    }

    /// Walk the computed layout, appending boxes in paint order.
    fn extract(
        &self,
        node: NodeId,
        offset_x: f32,
        offset_y: f32,
        out: &mut Vec<PositionedBox>,
    ) -> Result<(), RenderError> {
        let layout = self.taffy.layout(node)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        let (width, height) = (layout.size.width, layout.size.height);

        let content = match self.content.get(&node) {
            Some(NodeContent::Block(style)) => {
                if style.background.is_transparent() && style.border.is_zero() {
                    None
                } else {
                    Some(BoxContent::Decoration {
                        background: style.background,
                        border: style.border,
                        border_color: style.border_color,
                    })
                }
            }
            Some(NodeContent::Text { lines, style }) => {
                let line_h = self.fonts.line_height_px(style.font_size, style.line_height);
                let lines = lines
                    .iter()
                    .enumerate()
                    .map(|(i, (text, w))| TextLine {
                        text: text.clone(),
                        x_offset: match style.align {
                            TextAlign::Left => 0.0,
                            TextAlign::Center => ((width - w) / 2.0).max(0.0),
                            TextAlign::Right => (width - w).max(0.0),
                        },
                        y_offset: i as f32 * line_h,
                    })
                    .collect();
                Some(BoxContent::Text {
                    lines,
                    style: style.clone(),
                })
            }
            Some(NodeContent::Image(resource)) => Some(BoxContent::Image {
                resource: resource.clone(),
            }),
            None => None,
        };
        if let Some(content) = content {
            out.push(PositionedBox {
                x,
                y,
                width,
                height,
                content,
            });
        }

        for child in self.taffy.children(node)? {
            self.extract(child, x, y, out)?;
        }
        Ok(())
    }
}

/// Estimate the width each child of a row gets. Fixed widths come off the
/// top; what remains is shared by flex weight, auto children counting as 1.
fn row_slots(children: &[Node], inner_width: f32, gap: f32) -> Vec<f32> {
    let gaps = gap * children.len().saturating_sub(1) as f32;
    let available = (inner_width - gaps).max(0.0);

    enum Share {
        Fixed(f32),
        Weight(f32),
    }
    let shares: Vec<Share> = children
        .iter()
        .map(|child| match child {
            Node::Image { width, .. } => Share::Fixed(*width),
            Node::Block { style, .. } => match (style.width.resolve(inner_width), style.flex) {
                (Some(w), _) => Share::Fixed(w + style.margin.horizontal()),
                (None, Some(grow)) => Share::Weight(grow.max(0.0)),
                (None, None) => Share::Weight(1.0),
            },
            Node::Text { .. } => Share::Weight(1.0),
        })
        .collect();

    let fixed: f32 = shares
        .iter()
        .map(|s| match s {
            Share::Fixed(w) => *w,
            Share::Weight(_) => 0.0,
        })
        .sum();
    let weights: f32 = shares
        .iter()
        .map(|s| match s {
            Share::Fixed(_) => 0.0,
            Share::Weight(g) => *g,
        })
        .sum();
    let remaining = (available - fixed).max(0.0);

    shares
        .into_iter()
        .map(|s| match s {
            Share::Fixed(w) => w,
            Share::Weight(g) if weights > 0.0 => (remaining * g / weights).max(1.0),
            Share::Weight(_) => remaining.max(1.0),
        })
        .collect()
}

fn dim_to_taffy(d: Dimension) -> taffy::Dimension {
    match d {
        Dimension::Auto => taffy::Dimension::Auto,
        Dimension::Px(v) => taffy::Dimension::Length(v),
        Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn lp_rect(e: Edges) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(e.top),
        right: LengthPercentage::Length(e.right),
        bottom: LengthPercentage::Length(e.bottom),
        left: LengthPercentage::Length(e.left),
    }
}

fn box_to_taffy(s: &BoxStyle) -> Style {
    let fixed_width = !matches!(s.width, Dimension::Auto);
    Style {
        display: taffy::Display::Flex,
        flex_direction: match s.direction {
            Direction::Row => taffy::FlexDirection::Row,
            Direction::Column => taffy::FlexDirection::Column,
        },
        justify_content: Some(match s.justify {
            style::Justify::Start => taffy::JustifyContent::Start,
            style::Justify::End => taffy::JustifyContent::End,
            style::Justify::Center => taffy::JustifyContent::Center,
            style::Justify::SpaceBetween => taffy::JustifyContent::SpaceBetween,
        }),
        align_items: Some(match s.align {
            style::Align::Start => taffy::AlignItems::Start,
            style::Align::End => taffy::AlignItems::End,
            style::Align::Center => taffy::AlignItems::Center,
            style::Align::Stretch => taffy::AlignItems::Stretch,
        }),
        gap: Size {
            width: LengthPercentage::Length(s.gap),
            height: LengthPercentage::Length(s.gap),
        },
        size: Size {
            width: dim_to_taffy(s.width),
            height: dim_to_taffy(s.height),
        },
        // Flexible boxes may compress below their content so that shares
        // stay proportional.
        min_size: Size {
            width: if s.flex.is_some() {
                taffy::Dimension::Length(0.0)
            } else {
                taffy::Dimension::Auto
            },
            height: dim_to_taffy(s.min_height),
        },
        flex_grow: s.flex.unwrap_or(0.0),
        flex_shrink: if fixed_width { 0.0 } else { 1.0 },
        flex_basis: if s.flex.is_some() {
            taffy::Dimension::Length(0.0)
        } else {
            taffy::Dimension::Auto
        },
        margin: Rect {
            top: LengthPercentageAuto::Length(s.margin.top),
            right: LengthPercentageAuto::Length(s.margin.right),
            bottom: LengthPercentageAuto::Length(s.margin.bottom),
            left: LengthPercentageAuto::Length(s.margin.left),
        },
        padding: lp_rect(s.padding),
        border: lp_rect(s.border),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a page description.
pub fn compute_layout(
    page: &MarksheetPage,
    fonts: &FontManager,
) -> Result<PageLayout, RenderError> {
    let page_width = page.width_px();
    let page_height = page.height_px();
    let padding = Edges {
        top: page.padding_mm.top * PX_PER_MM,
        right: page.padding_mm.right * PX_PER_MM,
        bottom: page.padding_mm.bottom * PX_PER_MM,
        left: page.padding_mm.left * PX_PER_MM,
    };

    let mut builder = LayoutBuilder::new(fonts);
    let content_width = (page_width - padding.horizontal()).max(1.0);
    let child = builder.build_node(&page.root, content_width)?;

    let page_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: taffy::Dimension::Length(page_width),
            height: taffy::Dimension::Auto,
        },
        min_size: Size {
            width: taffy::Dimension::Auto,
            height: taffy::Dimension::Length(page_height),
        },
        padding: lp_rect(padding),
        ..Default::default()
    };
    let root = builder.taffy.new_with_children(page_style, &[child])?;

    builder.taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(page_width),
            height: AvailableSpace::MaxContent,
        },
    )?;

    let size = builder.taffy.layout(root)?.size;
    let mut boxes = Vec::new();
    // The child's location already includes the page padding.
    builder.extract(child, 0.0, 0.0, &mut boxes)?;

    let height = size.height.max(page_height);
    log::debug!(
        "laid out {} boxes on a {:.0}x{:.0} px page",
        boxes.len(),
        size.width,
        height
    );
    Ok(PageLayout {
        width: page_width,
        height,
        boxes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Orientation;
    use std::collections::BTreeMap;

    fn page(root: Node) -> MarksheetPage {
        MarksheetPage {
            orientation: Orientation::Portrait,
            width_mm: 210.0,
            height_mm: 297.0,
            padding_mm: Edges::all(10.0),
            base_font_size: 16.0,
            root,
            resources: BTreeMap::new(),
            watermark: None,
        }
    }

    fn text(s: &str) -> Node {
        Node::text(s, TextStyle::sized(16.0, Color::BLACK))
    }

    #[test]
    fn layout_simple_text() {
        let fonts = FontManager::new();
        let layout = compute_layout(
            &page(Node::block(BoxStyle::column(), vec![text("Hello world")])),
            &fonts,
        )
        .unwrap();
        assert_eq!(layout.boxes.len(), 1);
        let b = &layout.boxes[0];
        assert!(b.width > 0.0 && b.height > 0.0);
        // Inside the 10 mm margin.
        assert!((b.x - 10.0 * PX_PER_MM).abs() < 0.5);
        assert!((b.y - 10.0 * PX_PER_MM).abs() < 0.5);
        assert!((layout.height - 297.0 * PX_PER_MM).abs() < 0.5);
    }

    #[test]
    fn flex_row_shares_width() {
        let fonts = FontManager::new();
        let cell = |s: &str| {
            Node::block(
                BoxStyle::column().flex(1.0).background(Color::WHITE),
                vec![text(s)],
            )
        };
        let layout = compute_layout(
            &page(Node::block(BoxStyle::row(), vec![cell("A"), cell("B")])),
            &fonts,
        )
        .unwrap();
        let cells: Vec<_> = layout
            .boxes
            .iter()
            .filter(|b| matches!(b.content, BoxContent::Decoration { .. }))
            .collect();
        assert_eq!(cells.len(), 2);
        assert!((cells[0].width - cells[1].width).abs() < 0.5);
        assert!(cells[1].x > cells[0].x);
    }

    #[test]
    fn centered_lines_are_offset() {
        let fonts = FontManager::new();
        let layout = compute_layout(
            &page(Node::block(
                BoxStyle::column(),
                vec![Node::text(
                    "Hi",
                    TextStyle::sized(16.0, Color::BLACK).align(TextAlign::Center),
                )],
            )),
            &fonts,
        )
        .unwrap();
        let BoxContent::Text { lines, .. } = &layout.boxes[0].content else {
            panic!("expected text");
        };
        let expected = (layout.boxes[0].width - 16.0) / 2.0;
        assert!((lines[0].x_offset - expected).abs() < 0.5);
    }

    #[test]
    fn tall_content_grows_the_page() {
        let fonts = FontManager::new();
        let tall = Node::block(
            BoxStyle::column().height(Dimension::Px(3000.0)),
            vec![],
        );
        let layout = compute_layout(&page(tall), &fonts).unwrap();
        assert!(layout.height > 3000.0);
    }

    #[test]
    fn row_slots_split_after_fixed() {
        let children = vec![
            Node::block(BoxStyle::column().width(Dimension::Px(100.0)), vec![]),
            Node::block(BoxStyle::column().flex(1.0), vec![]),
            Node::block(BoxStyle::column().flex(3.0), vec![]),
        ];
        let slots = row_slots(&children, 520.0, 10.0);
        assert_eq!(slots, vec![100.0, 100.0, 300.0]);
    }
}
