//! Layout composition: one student's record becomes a [`MarksheetPage`].
//!
//! Composition is a pure function of its inputs. Running it twice on the same
//! inputs yields descriptions that serialize to identical bytes, which is what
//! lets the page be rendered, cached or diffed independently of where it came
//! from.
//!
//! Content order on the page:
//!
//! 1. school header (logo, name, address, affiliation) and session badge
//! 2. report title
//! 3. student information grid, with the photo on the right when enabled
//! 4. scholastic table closed by a grand-total row
//! 5. co-scholastic table beside the final-result box
//! 6. verification block, signatures and the footer line

use std::collections::BTreeMap;

use qrcode::{Color as Module, EcLevel, QrCode};

use crate::grading::{aggregate, DerivedResult};
use crate::model::{ClassConfig, ExamColumn, Orientation, SchoolInfo, Student, SubjectConfig};
use crate::page::{MarksheetPage, Node, Watermark, PX_PER_MM};
use crate::style::{Align, BoxStyle, Color, Dimension, Edges, Justify, TextAlign, TextStyle};
use crate::theme::{SchoolNameAlign, ThemeConfig};

pub const LOGO_RESOURCE: &str = "logo";
pub const PHOTO_RESOURCE: &str = "photo";

const WATERMARK_WIDTH: f32 = 0.6;
/// Outer side of the verification box in CSS px.
const QR_BOX: f32 = 98.0;
/// Border plus padding of the verification box; doubles as the quiet zone.
const QR_INSET: f32 = 5.0;

/// Everything a marksheet depends on.
#[derive(Debug, Clone, Copy)]
pub struct MarksheetInputs<'a> {
    pub student: &'a Student,
    pub class: &'a ClassConfig,
    pub school: &'a SchoolInfo,
    pub theme: &'a ThemeConfig,
    pub orientation: Orientation,
    /// Base font size in CSS px.
    pub font_size: f32,
}

/// Text encoded by the verification block.
pub fn verification_payload(student: &Student, result: &DerivedResult) -> String {
    format!(
        "Name:{},Roll:{},Result:{},Pct:{:.2}",
        student.name,
        student.roll_no,
        result.outcome.label(),
        result.percentage
    )
}

/// QR symbol for a verification payload, `None` when the payload is too long
/// to encode.
pub fn verification_code(payload: &str) -> Option<QrCode> {
    QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L).ok()
}

/// Lay the symbol's modules out as rows of runs inside a `side` px square.
/// Dark runs are filled black, light runs are left transparent.
fn qr_grid(code: &QrCode, side: f32) -> Node {
    let width = code.width();
    let module = side / width as f32;
    let colors = code.to_colors();

    let rows = colors
        .chunks(width)
        .map(|row| {
            let mut runs = Vec::new();
            let mut start = 0;
            for x in 1..=width {
                if x < width && row[x] == row[start] {
                    continue;
                }
                let mut style = BoxStyle::row()
                    .width(Dimension::Px(module * x as f32 - module * start as f32))
                    .height(Dimension::Px(module));
                if row[start] == Module::Dark {
                    style = style.background(Color::BLACK);
                }
                runs.push(Node::block(style, vec![]));
                start = x;
            }
            Node::block(BoxStyle::row(), runs)
        })
        .collect();

    Node::block(
        BoxStyle::column()
            .width(Dimension::Px(side))
            .height(Dimension::Px(side)),
        rows,
    )
}

/// Marks as entered: integral values without a fraction.
fn format_marks(value: f64) -> String {
    format!("{value}")
}

/// Build the page description for one student.
pub fn compose(inputs: &MarksheetInputs<'_>) -> MarksheetPage {
    let result = aggregate(inputs.student, inputs.class);
    let size = inputs.orientation.page_size();
    let (width_mm, height_mm) = (size.width, size.height);
    let margins = inputs.theme.margins;
    let padding_mm = Edges {
        top: margins.top,
        right: margins.right,
        bottom: margins.bottom,
        left: margins.left,
    };

    let mut resources = BTreeMap::new();
    if let Some(logo) = &inputs.school.logo {
        resources.insert(LOGO_RESOURCE.to_string(), logo.clone());
    }
    let show_photo = inputs.class.enable_photo && inputs.student.photo.is_some();
    if let (true, Some(photo)) = (show_photo, &inputs.student.photo) {
        resources.insert(PHOTO_RESOURCE.to_string(), photo.clone());
    }

    let watermark = inputs.school.logo.as_ref().map(|_| Watermark {
        resource: LOGO_RESOURCE.to_string(),
        opacity: inputs.theme.watermark_opacity,
        width_fraction: WATERMARK_WIDTH,
        grayscale: true,
    });

    // The frame fills the page even when the content is short.
    let frame_min_height = height_mm * PX_PER_MM - padding_mm.vertical() * PX_PER_MM;

    let composer = Composer {
        inputs,
        result: &result,
        theme: inputs.theme,
        em: inputs.font_size,
    };
    let root = composer.frame(frame_min_height, show_photo);

    MarksheetPage {
        orientation: inputs.orientation,
        width_mm,
        height_mm,
        padding_mm,
        base_font_size: inputs.font_size,
        root,
        resources,
        watermark,
    }
}

struct Composer<'a> {
    inputs: &'a MarksheetInputs<'a>,
    result: &'a DerivedResult,
    theme: &'a ThemeConfig,
    em: f32,
}

impl Composer<'_> {
    fn em(&self, factor: f32) -> f32 {
        self.em * factor
    }

    fn text(&self, factor: f32, color: Color) -> TextStyle {
        TextStyle::sized(self.em(factor), color)
    }

    fn frame(&self, min_height: f32, show_photo: bool) -> Node {
        let border = self.theme.page_border_color;
        let mut outer = BoxStyle::column()
            .border(Edges::all(3.0), border)
            .padding(Edges::all(4.0));
        outer.min_height = Dimension::Px(min_height);

        let mut inner = BoxStyle::column()
            .border(Edges::all(1.0), border)
            .padding(Edges::all(24.0));
        inner.min_height = Dimension::Px((min_height - 14.0).max(0.0));

        Node::block(
            outer,
            vec![Node::block(
                inner,
                vec![
                    self.header(),
                    self.title(),
                    self.student_info(show_photo),
                    self.scholastic_table(),
                    self.summary_row(),
                    self.footer(),
                ],
            )],
        )
    }

    // -- header ------------------------------------------------------------

    fn header(&self) -> Node {
        let t = self.theme;
        let school = self.inputs.school;

        let (justify, align) = match t.school_name_align {
            SchoolNameAlign::Left => (Justify::Start, TextAlign::Left),
            SchoolNameAlign::Center => (Justify::Center, TextAlign::Center),
            SchoolNameAlign::Right => (Justify::End, TextAlign::Right),
        };

        let lines = Node::block(
            BoxStyle::column().gap(4.0),
            vec![
                Node::text(
                    school.name.to_uppercase(),
                    self.text(t.school_name_size, t.school_name_color)
                        .bold()
                        .line_height(1.2)
                        .align(align),
                ),
                Node::text(
                    school.address.clone(),
                    self.text(1.125, t.header_secondary_color).align(align),
                ),
                Node::text(
                    school.affiliation.clone(),
                    self.text(0.875, t.header_secondary_color)
                        .italic()
                        .align(align),
                ),
            ],
        );

        let logo = school
            .logo
            .as_ref()
            .map(|_| Node::image(LOGO_RESOURCE, 96.0, 96.0));
        let mut identity = Vec::new();
        match (t.school_name_align, logo) {
            (SchoolNameAlign::Right, Some(logo)) => {
                identity.push(lines);
                identity.push(logo);
            }
            (_, Some(logo)) => {
                identity.push(logo);
                identity.push(lines);
            }
            (_, None) => identity.push(lines),
        }

        let badge = Node::block(
            BoxStyle::row()
                .padding(Edges::symmetric(8.0, 32.0))
                .background(t.session_badge_bg),
            vec![Node::text(
                format!("ACADEMIC SESSION: {}", school.session.to_uppercase()),
                self.text(t.session_badge_size, t.session_badge_color)
                    .bold()
                    .line_height(1.2),
            )],
        );

        Node::block(
            BoxStyle::column()
                .border(Edges::bottom(2.0), t.page_border_color)
                .padding(Edges::bottom(16.0))
                .margin(Edges::bottom(24.0)),
            vec![
                Node::block(
                    BoxStyle::row()
                        .justify(justify)
                        .align(Align::Center)
                        .gap(24.0)
                        .margin(Edges::bottom(8.0)),
                    identity,
                ),
                Node::block(
                    BoxStyle::row()
                        .justify(Justify::Center)
                        .align(Align::End)
                        .margin(Edges::top(16.0)),
                    vec![badge],
                ),
            ],
        )
    }

    fn title(&self) -> Node {
        let t = self.theme;
        Node::block(
            BoxStyle::row()
                .justify(Justify::Center)
                .margin(Edges::bottom(24.0)),
            vec![Node::block(
                BoxStyle::column()
                    .border(Edges::bottom(4.0), t.page_border_color)
                    .padding(Edges::bottom(4.0)),
                vec![Node::text(
                    "PROGRESS REPORT CARD",
                    self.text(1.5, t.school_name_color).bold(),
                )],
            )],
        )
    }

    // -- student info ------------------------------------------------------

    fn info_fields(&self) -> Vec<(String, String)> {
        let student = self.inputs.student;
        let mut fields = vec![
            ("Student Name".to_string(), student.name.clone()),
            ("Class".to_string(), self.inputs.class.class_name.clone()),
            ("Roll Number".to_string(), student.roll_no.clone()),
            ("Gender".to_string(), student.gender.to_string()),
        ];
        for field in &self.inputs.class.extra_info_fields {
            fields.push((field.clone(), student.info_value(field).to_string()));
        }
        fields
    }

    fn info_cell(&self, label: &str, value: &str, emphasised: bool) -> Node {
        let t = self.theme;
        let value_style = if emphasised {
            self.text(1.125, t.student_value_color).bold()
        } else {
            self.text(1.0, t.student_value_color).bold()
        };
        Node::block(
            BoxStyle::row()
                .align(Align::Center)
                .flex(1.0)
                .border(Edges::bottom(1.0), t.table_border_color)
                .padding(Edges::bottom(4.0)),
            vec![
                Node::block(
                    BoxStyle::column().width(Dimension::Px(128.0)),
                    vec![Node::text(
                        label.to_uppercase(),
                        self.text(0.75, t.student_label_color).bold(),
                    )],
                ),
                Node::block(
                    BoxStyle::column().flex(1.0),
                    if value.is_empty() {
                        vec![]
                    } else {
                        vec![Node::text(value, value_style.line_height(1.25))]
                    },
                ),
            ],
        )
    }

    fn student_info(&self, show_photo: bool) -> Node {
        let t = self.theme;
        let per_row = match self.inputs.orientation {
            Orientation::Portrait => 2,
            Orientation::Landscape => 4,
        };

        let fields = self.info_fields();
        let rows: Vec<Node> = fields
            .chunks(per_row)
            .enumerate()
            .map(|(row, chunk)| {
                let mut cells: Vec<Node> = chunk
                    .iter()
                    .enumerate()
                    .map(|(col, (label, value))| {
                        self.info_cell(label, value, row == 0 && col == 0)
                    })
                    .collect();
                // Keep the columns aligned on a short last row.
                while cells.len() < per_row {
                    cells.push(Node::block(BoxStyle::column().flex(1.0), vec![]));
                }
                Node::block(BoxStyle::row().gap(48.0), cells)
            })
            .collect();

        let mut children = vec![Node::block(
            BoxStyle::column()
                .flex(1.0)
                .gap(16.0)
                .justify(Justify::Center),
            rows,
        )];
        if show_photo {
            children.push(Node::block(
                BoxStyle::column()
                    .width(Dimension::Px(128.0))
                    .height(Dimension::Px(160.0))
                    .border(Edges::all(2.0), Color::WHITE)
                    .background(Color::rgb(0xe5, 0xe7, 0xeb)),
                vec![Node::image(PHOTO_RESOURCE, 124.0, 156.0)],
            ));
        }

        Node::block(
            BoxStyle::row()
                .gap(24.0)
                .padding(Edges::all(24.0))
                .margin(Edges::bottom(32.0))
                .border(Edges::all(1.0), t.table_border_color)
                .background(t.student_info_bg),
            children,
        )
    }

    // -- tables ------------------------------------------------------------

    fn tab(&self, label: &str, background: Color, vertical_padding: f32) -> Node {
        Node::block(
            BoxStyle::row(),
            vec![Node::block(
                BoxStyle::row()
                    .padding(Edges::symmetric(vertical_padding, 16.0))
                    .background(background),
                vec![Node::text(
                    label,
                    self.text(0.75, Color::WHITE).bold(),
                )],
            )],
        )
    }

    fn cell(&self, def: Cell) -> Node {
        let align = match def.align {
            TextAlign::Left => Align::Start,
            TextAlign::Center => Align::Center,
            TextAlign::Right => Align::End,
        };
        let mut style = BoxStyle::column()
            .justify(Justify::Center)
            .align(align)
            .padding(Edges::all(def.padding));
        style = match def.width {
            CellWidth::Flex(grow) => style.flex(grow),
            CellWidth::Fixed(px) => style.width(Dimension::Px(px)),
        };
        if def.divider {
            style = style.border(
                Edges {
                    right: 1.0,
                    ..Edges::ZERO
                },
                def.divider_color,
            );
        }
        if let Some(bg) = def.background {
            style = style.background(bg);
        }
        let children = if def.text.is_empty() {
            vec![]
        } else {
            vec![Node::text(def.text, def.style.align(def.align))]
        };
        Node::block(style, children)
    }

    fn scholastic_table(&self) -> Node {
        let t = self.theme;
        let columns = self.inputs.class.exam_columns();
        let border = t.table_border_color;

        let header_style = self.text(0.75, t.table_header_color).bold();
        let mut header_cells = vec![self.cell(Cell::new(
            "SUBJECT",
            header_style.clone(),
            SUBJECT_FLEX,
            border,
        ))];
        for column in &columns {
            header_cells.push(
                self.cell(
                    Cell::new("MM", header_style.clone(), MM_FLEX, border)
                        .centered()
                        .background(Color::BLACK.with_alpha(0.05)),
                ),
            );
            header_cells.push(self.cell(
                Cell::new(
                    &column.name.to_uppercase(),
                    header_style.clone(),
                    EXAM_FLEX,
                    border,
                )
                .centered(),
            ));
        }
        header_cells.push(
            self.cell(
                Cell::new("TOTAL", header_style.clone(), TOTAL_FLEX, border)
                    .centered()
                    .background(Color::BLACK.with_alpha(0.05)),
            ),
        );
        header_cells.push(self.cell(
            Cell::new("GRADE", header_style, GRADE_FLEX, border)
                .centered()
                .no_divider(),
        ));

        let mut rows = vec![Node::block(
            BoxStyle::row()
                .background(t.table_header_bg)
                .border(Edges::bottom(2.0), border),
            header_cells,
        )];

        for (idx, subject) in self.inputs.class.scholastic_subjects().enumerate() {
            let background = if idx % 2 == 0 {
                t.table_row_odd_bg
            } else {
                t.table_row_even_bg
            };
            rows.push(self.subject_row(subject, &columns, background));
        }
        rows.push(self.grand_total_row(&columns));

        Node::block(
            BoxStyle::column().margin(Edges::bottom(24.0)),
            vec![
                self.tab("SCHOLASTIC ACHIEVEMENT", t.page_border_color, 8.0),
                Node::block(
                    BoxStyle::column().border(Edges::all(2.0), border),
                    rows,
                ),
            ],
        )
    }

    fn subject_row(
        &self,
        subject: &SubjectConfig,
        columns: &[ExamColumn],
        background: Color,
    ) -> Node {
        let t = self.theme;
        let border = t.table_border_color;
        let student = self.inputs.student;
        let body = self.text(0.875, t.student_value_color);

        let mut cells = vec![self.cell(Cell::new(
            &subject.name,
            body.clone().bold(),
            SUBJECT_FLEX,
            border,
        ))];
        for column in columns {
            let (max, obtained) = match subject.exam(&column.exam_id) {
                Some(exam) => (
                    format_marks(exam.max_marks),
                    format_marks(student.mark(&subject.id, &exam.id).unwrap_or(0.0)),
                ),
                None => (String::new(), String::new()),
            };
            cells.push(
                self.cell(
                    Cell::new(&max, self.text(0.875, t.student_label_color).bold(), MM_FLEX, border)
                        .centered()
                        .background(Color::BLACK.with_alpha(0.02)),
                ),
            );
            cells.push(self.cell(Cell::new(&obtained, body.clone(), EXAM_FLEX, border).centered()));
        }

        let (total, grade) = match self.result.subject(&subject.id) {
            Some(r) => (format_marks(r.obtained), r.grade.to_string()),
            None => (String::new(), String::new()),
        };
        cells.push(
            self.cell(
                Cell::new(&total, self.text(0.875, t.page_border_color).bold(), TOTAL_FLEX, border)
                    .centered()
                    .background(Color::BLACK.with_alpha(0.03)),
            ),
        );
        cells.push(
            self.cell(
                Cell::new(&grade, self.text(0.875, t.grade_color).bold(), GRADE_FLEX, border)
                    .centered()
                    .no_divider(),
            ),
        );

        Node::block(
            BoxStyle::row()
                .background(background)
                .border(Edges::bottom(1.0), border),
            cells,
        )
    }

    fn grand_total_row(&self, columns: &[ExamColumn]) -> Node {
        let t = self.theme;
        let divider = Color::WHITE.with_alpha(0.2);
        let label = self.text(0.875, Color::WHITE).bold();

        let mut cells = vec![self.cell(
            Cell::new("GRAND TOTAL", label, SUBJECT_FLEX, divider)
                .aligned(TextAlign::Right)
                .no_divider(),
        )];
        for _ in columns {
            let blank = self.text(0.875, Color::WHITE);
            cells.push(self.cell(Cell::new("", blank.clone(), MM_FLEX, divider)));
            cells.push(self.cell(Cell::new("", blank, EXAM_FLEX, divider)));
        }
        let totals = format!(
            "{} / {}",
            format_marks(self.result.grand_total_obtained),
            format_marks(self.result.grand_total_max)
        );
        cells.push(
            self.cell(
                Cell::new(&totals, self.text(0.984, Color::WHITE).bold(), TOTAL_FLEX, divider)
                    .centered(),
            ),
        );
        cells.push(self.cell(
            Cell::new("", self.text(0.875, Color::WHITE), GRADE_FLEX, divider).no_divider(),
        ));

        Node::block(
            BoxStyle::row()
                .background(t.page_border_color)
                .border(Edges::top(2.0), t.page_border_color),
            cells,
        )
    }

    fn co_scholastic_table(&self) -> Node {
        let t = self.theme;
        let border = t.table_border_color;
        let student = self.inputs.student;

        let head = self.text(0.75, t.student_label_color).bold();
        let mut rows = vec![Node::block(
            BoxStyle::row()
                .background(t.table_row_even_bg)
                .border(Edges::bottom(1.0), border),
            vec![
                self.cell(
                    Cell::new("ACTIVITY", head.clone(), CellWidth::Flex(1.0), border)
                        .padded(8.0)
                        .no_divider(),
                ),
                self.cell(
                    Cell::new("GRADE", head, CellWidth::Fixed(96.0), border)
                        .padded(8.0)
                        .centered()
                        .no_divider(),
                ),
            ],
        )];

        for (idx, subject) in self.inputs.class.co_scholastic_subjects().enumerate() {
            let background = if idx % 2 != 0 {
                t.table_row_odd_bg
            } else {
                t.table_row_even_bg
            };
            let grade = student
                .co_scholastic_grade(&subject.id)
                .filter(|g| !g.is_empty())
                .unwrap_or("-");
            rows.push(Node::block(
                BoxStyle::row()
                    .background(background)
                    .border(Edges::bottom(1.0), border),
                vec![
                    self.cell(
                        Cell::new(
                            &subject.name,
                            self.text(0.875, t.student_value_color),
                            CellWidth::Flex(1.0),
                            border,
                        )
                        .padded(8.0)
                        .no_divider(),
                    ),
                    self.cell(
                        Cell::new(
                            grade,
                            self.text(0.875, t.grade_color).bold(),
                            CellWidth::Fixed(96.0),
                            border,
                        )
                        .padded(8.0)
                        .centered()
                        .no_divider(),
                    ),
                ],
            ));
        }

        Node::block(
            BoxStyle::column().flex(1.0),
            vec![
                self.tab("CO-SCHOLASTIC AREAS", t.header_secondary_color, 6.0),
                Node::block(
                    BoxStyle::column().border(Edges::all(1.0), border),
                    rows,
                ),
            ],
        )
    }

    fn result_box(&self) -> Node {
        let t = self.theme;
        let scale = t.result_content_scale;
        let status_color = if self.result.outcome.is_pass() {
            t.result_pass_color
        } else {
            t.result_fail_color
        };
        let caption = |label: &str| {
            Node::text(
                label,
                self.text(0.75, t.student_label_color)
                    .align(TextAlign::Center),
            )
        };

        let body = Node::block(
            BoxStyle::column()
                .justify(Justify::Center)
                .align(Align::Center)
                .height(Dimension::Px(200.0))
                .padding(Edges::all(24.0))
                .gap(4.0)
                .border(Edges::all(2.0), t.page_border_color)
                .background(Color::WHITE),
            vec![
                caption("PERCENTAGE"),
                Node::text(
                    format!("{:.2}%", self.result.percentage),
                    self.text(2.25 * scale, t.school_name_color)
                        .bold()
                        .line_height(1.2)
                        .align(TextAlign::Center),
                ),
                Node::block(
                    BoxStyle::column()
                        .width(Dimension::Percent(100.0))
                        .height(Dimension::Px(1.0))
                        .margin(Edges::bottom(8.0))
                        .background(t.table_border_color),
                    vec![],
                ),
                caption("STATUS"),
                Node::block(
                    BoxStyle::row()
                        .padding(Edges::symmetric(4.0, 16.0))
                        .border(Edges::all(2.0), status_color)
                        .background(status_color.with_alpha(16.0 / 255.0)),
                    vec![Node::text(
                        self.result.outcome.label(),
                        self.text(1.5 * scale, status_color)
                            .bold()
                            .line_height(1.2),
                    )],
                ),
            ],
        );

        Node::block(
            BoxStyle::column().width(Dimension::Px(288.0)),
            vec![self.tab("FINAL RESULT", t.page_border_color, 6.0), body],
        )
    }

    fn summary_row(&self) -> Node {
        Node::block(
            BoxStyle::row()
                .gap(32.0)
                .align(Align::Start)
                .margin(Edges::bottom(8.0)),
            vec![self.co_scholastic_table(), self.result_box()],
        )
    }

    // -- footer ------------------------------------------------------------

    fn verification_block(&self) -> Node {
        let t = self.theme;
        let payload = verification_payload(self.inputs.student, self.result);
        let symbol = match verification_code(&payload) {
            Some(code) => vec![qr_grid(&code, QR_BOX - 2.0 * QR_INSET)],
            None => {
                log::warn!(
                    "verification payload of student '{}' is too long for a QR code",
                    self.inputs.student.id
                );
                vec![]
            }
        };

        Node::block(
            BoxStyle::column().align(Align::Center).gap(8.0),
            vec![
                Node::block(
                    BoxStyle::column()
                        .justify(Justify::Center)
                        .align(Align::Center)
                        .width(Dimension::Px(QR_BOX))
                        .height(Dimension::Px(QR_BOX))
                        .padding(Edges::all(QR_INSET - 1.0))
                        .border(Edges::all(1.0), t.table_border_color)
                        .background(Color::WHITE),
                    symbol,
                ),
                Node::text("SCAN TO VERIFY", self.text(0.625, t.student_label_color)),
            ],
        )
    }

    fn signature(&self, role: &str) -> Node {
        let t = self.theme;
        Node::block(
            BoxStyle::column().align(Align::Center),
            vec![
                Node::block(
                    BoxStyle::column()
                        .width(Dimension::Px(160.0))
                        .border(Edges::bottom(2.0), t.table_border_color)
                        .margin(Edges::bottom(8.0)),
                    vec![],
                ),
                Node::text(role, self.text(0.875, t.header_secondary_color).bold()),
            ],
        )
    }

    fn footer(&self) -> Node {
        let t = self.theme;
        let small = self.text(0.625, t.student_label_color);
        Node::block(
            BoxStyle::column().margin(Edges::top(32.0)),
            vec![
                Node::block(
                    BoxStyle::row()
                        .justify(Justify::SpaceBetween)
                        .align(Align::End)
                        .padding(Edges::symmetric(0.0, 16.0))
                        .margin(Edges::bottom(24.0)),
                    vec![
                        self.verification_block(),
                        Node::block(
                            BoxStyle::row()
                                .gap(128.0)
                                .padding(Edges::bottom(8.0)),
                            vec![self.signature("CLASS TEACHER"), self.signature("PRINCIPAL")],
                        ),
                    ],
                ),
                Node::block(
                    BoxStyle::row()
                        .justify(Justify::SpaceBetween)
                        .align(Align::Center)
                        .border(Edges::top(1.0), t.table_border_color)
                        .padding(Edges::top(12.0)),
                    vec![
                        Node::text(
                            format!("Generated by {}", self.inputs.school.name),
                            small.clone(),
                        ),
                        Node::text("This document is computer generated.", small),
                    ],
                ),
            ],
        )
    }
}

// Relative column widths of the scholastic table.
const SUBJECT_FLEX: CellWidth = CellWidth::Flex(2.2);
const MM_FLEX: CellWidth = CellWidth::Flex(0.8);
const EXAM_FLEX: CellWidth = CellWidth::Flex(1.2);
const TOTAL_FLEX: CellWidth = CellWidth::Flex(1.0);
const GRADE_FLEX: CellWidth = CellWidth::Flex(0.9);

#[derive(Debug, Clone, Copy)]
enum CellWidth {
    Flex(f32),
    Fixed(f32),
}

/// One table cell under construction.
struct Cell {
    text: String,
    style: TextStyle,
    width: CellWidth,
    align: TextAlign,
    padding: f32,
    background: Option<Color>,
    divider: bool,
    divider_color: Color,
}

impl Cell {
    fn new(text: &str, style: TextStyle, width: CellWidth, divider_color: Color) -> Self {
        Self {
            text: text.to_string(),
            style,
            width,
            align: TextAlign::Left,
            padding: 12.0,
            background: None,
            divider: true,
            divider_color,
        }
    }

    fn centered(self) -> Self {
        self.aligned(TextAlign::Center)
    }

    fn aligned(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    fn padded(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    fn background(mut self, background: Color) -> Self {
        self.background = Some(background);
        self
    }

    fn no_divider(mut self) -> Self {
        self.divider = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples;

    fn demo() -> (Student, ClassConfig, SchoolInfo, ThemeConfig) {
        let class = samples::demo_class();
        let student = samples::demo_students(&class, 1).remove(0);
        (student, class, samples::demo_school(), ThemeConfig::default())
    }

    fn inputs<'a>(
        student: &'a Student,
        class: &'a ClassConfig,
        school: &'a SchoolInfo,
        theme: &'a ThemeConfig,
        orientation: Orientation,
    ) -> MarksheetInputs<'a> {
        MarksheetInputs {
            student,
            class,
            school,
            theme,
            orientation,
            font_size: 18.0,
        }
    }

    #[test]
    fn page_size_follows_orientation() {
        let (st, c, s, t) = demo();
        let p = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert_eq!((p.width_mm, p.height_mm), (210.0, 297.0));
        let l = compose(&inputs(&st, &c, &s, &t, Orientation::Landscape));
        assert_eq!((l.width_mm, l.height_mm), (297.0, 210.0));
        assert_eq!(p.padding_mm, Edges::all(10.0));
    }

    #[test]
    fn content_order() {
        let (st, c, s, t) = demo();
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        let texts = page.root.texts();
        let pos = |needle: &str| {
            texts
                .iter()
                .position(|t| *t == needle)
                .unwrap_or_else(|| panic!("missing {needle:?} in {texts:?}"))
        };
        let order = [
            pos(&s.name.to_uppercase()),
            pos("PROGRESS REPORT CARD"),
            pos("STUDENT NAME"),
            pos("SCHOLASTIC ACHIEVEMENT"),
            pos("GRAND TOTAL"),
            pos("CO-SCHOLASTIC AREAS"),
            pos("FINAL RESULT"),
            pos("SCAN TO VERIFY"),
            pos("CLASS TEACHER"),
            pos("PRINCIPAL"),
            pos("This document is computer generated."),
        ];
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{order:?}");
    }

    #[test]
    fn missing_values_render_empty_or_dash() {
        let (mut st, c, s, t) = demo();
        st.info.clear();
        st.co_scholastic_grades.clear();
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        let texts = page.root.texts();
        assert!(!texts.iter().any(|t| t.is_empty()));
        assert_eq!(texts.iter().filter(|t| **t == "-").count(), 2);
    }

    #[test]
    fn union_exam_columns_leave_blank_cells() {
        let (st, mut c, s, t) = demo();
        c.subjects[1].exams.retain(|e| e.id == "e1");
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        // Header still lists both terms once.
        let texts = page.root.texts();
        assert_eq!(texts.iter().filter(|t| **t == "TERM 2").count(), 1);
        assert_eq!(texts.iter().filter(|t| **t == "MM").count(), 2);
    }

    #[test]
    fn photo_needs_class_toggle_and_student_photo() {
        let (mut st, mut c, s, t) = demo();
        st.photo = Some(samples::PLACEHOLDER_PNG.to_string());
        c.enable_photo = false;
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert!(!page.resources.contains_key(PHOTO_RESOURCE));

        c.enable_photo = true;
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert!(page.resources.contains_key(PHOTO_RESOURCE));
        assert!(page.referenced_resources().contains(&PHOTO_RESOURCE));
    }

    #[test]
    fn watermark_only_with_logo() {
        let (st, c, mut s, t) = demo();
        s.logo = None;
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert!(page.watermark.is_none());
        assert!(page.resources.is_empty());

        s.logo = Some(samples::PLACEHOLDER_PNG.to_string());
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        let w = page.watermark.unwrap();
        assert_eq!(w.width_fraction, 0.6);
        assert_eq!(w.opacity, t.watermark_opacity);
    }

    #[test]
    fn verification_payload_format() {
        let (st, c, _, _) = demo();
        let result = aggregate(&st, &c);
        let payload = verification_payload(&st, &result);
        assert_eq!(
            payload,
            format!(
                "Name:{},Roll:{},Result:{},Pct:{:.2}",
                st.name,
                st.roll_no,
                result.outcome.label(),
                result.percentage
            )
        );
    }

    /// Read a module grid back into dark/light flags, row by row.
    fn read_grid(grid: &Node, module: f32) -> Vec<bool> {
        let mut modules = Vec::new();
        let Node::Block { children: rows, .. } = grid else {
            panic!("grid is not a block");
        };
        for row in rows {
            let Node::Block { children: runs, .. } = row else {
                panic!("row is not a block");
            };
            for run in runs {
                let Node::Block { style, .. } = run else {
                    panic!("run is not a block");
                };
                let Dimension::Px(w) = style.width else {
                    panic!("run without a fixed width");
                };
                let dark = style.background == Color::BLACK;
                let count = (w / module).round() as usize;
                modules.extend(std::iter::repeat(dark).take(count));
            }
        }
        modules
    }

    #[test]
    fn verification_grid_encodes_payload() {
        let (st, c, _, _) = demo();
        let payload = verification_payload(&st, &aggregate(&st, &c));
        let code = verification_code(&payload).unwrap();
        let width = code.width();
        let grid = qr_grid(&code, 88.0);

        let Node::Block { children: rows, .. } = &grid else {
            panic!("grid is not a block");
        };
        assert_eq!(rows.len(), width);

        let expected: Vec<bool> = code
            .to_colors()
            .into_iter()
            .map(|m| m == Module::Dark)
            .collect();
        assert_eq!(read_grid(&grid, 88.0 / width as f32), expected);
    }

    #[test]
    fn verification_grid_is_on_the_page() {
        let (st, c, s, t) = demo();
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        let payload = verification_payload(&st, &aggregate(&st, &c));
        let grid = qr_grid(&verification_code(&payload).unwrap(), QR_BOX - 2.0 * QR_INSET);

        let mut found = 0;
        page.root.walk(&mut |n| {
            if *n == grid {
                found += 1;
            }
        });
        assert_eq!(found, 1);
    }

    #[test]
    fn oversized_payload_leaves_empty_verification_box() {
        let (mut st, c, s, t) = demo();
        st.name = "x".repeat(4000);
        assert!(verification_code(&verification_payload(&st, &aggregate(&st, &c))).is_none());

        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert!(page.root.texts().contains(&"SCAN TO VERIFY"));
        let mut dark = 0;
        page.root.walk(&mut |n| {
            if let Node::Block { style, .. } = n {
                if style.background == Color::BLACK {
                    dark += 1;
                }
            }
        });
        assert_eq!(dark, 0);
    }

    /// Number of cells in the info row holding "STUDENT NAME".
    fn first_info_row_len(root: &Node) -> usize {
        let mut len = None;
        root.walk(&mut |n| {
            let Node::Block { children, .. } = n else {
                return;
            };
            let holds_name = children.iter().any(|cell| match cell {
                Node::Block { children: parts, .. } => parts
                    .first()
                    .is_some_and(|label| label.texts() == ["STUDENT NAME"]),
                _ => false,
            });
            // Rows are visited before the cells inside them.
            if holds_name && len.is_none() {
                len = Some(children.len());
            }
        });
        len.unwrap_or_else(|| panic!("no info row"))
    }

    #[test]
    fn info_grid_columns_follow_orientation() {
        let (st, c, s, t) = demo();
        let portrait = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert_eq!(first_info_row_len(&portrait.root), 2);
        let landscape = compose(&inputs(&st, &c, &s, &t, Orientation::Landscape));
        assert_eq!(first_info_row_len(&landscape.root), 4);
    }

    /// Style of the last text node reading exactly `needle`.
    fn text_style<'a>(root: &'a Node, needle: &str) -> &'a TextStyle {
        let mut found = None;
        root.walk(&mut |n| {
            if let Node::Text { text, style } = n {
                if text == needle {
                    found = Some(style);
                }
            }
        });
        found.unwrap_or_else(|| panic!("missing {needle:?}"))
    }

    #[test]
    fn status_colour_follows_outcome() {
        let (mut st, c, s, mut t) = demo();
        t.result_pass_color = Color::rgb(0x10, 0x80, 0x10);
        t.result_fail_color = Color::rgb(0xc0, 0x20, 0x20);

        assert!(aggregate(&st, &c).outcome.is_pass());
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert_eq!(text_style(&page.root, "PASS").color, t.result_pass_color);

        for mark in &mut st.marks {
            mark.obtained = 0.0;
        }
        assert!(!aggregate(&st, &c).outcome.is_pass());
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));
        assert_eq!(
            text_style(&page.root, "NEEDS IMPROVEMENT").color,
            t.result_fail_color
        );
    }

    #[test]
    fn result_content_scale_enlarges_percentage_and_status() {
        let (st, c, s, mut t) = demo();
        t.result_content_scale = 1.5;
        let result = aggregate(&st, &c);
        let page = compose(&inputs(&st, &c, &s, &t, Orientation::Portrait));

        let pct = text_style(&page.root, &format!("{:.2}%", result.percentage));
        assert_eq!(pct.font_size, 18.0 * (2.25 * 1.5));
        let status = text_style(&page.root, result.outcome.label());
        assert_eq!(status.font_size, 18.0 * (1.5 * 1.5));
    }

    #[test]
    fn integral_marks_have_no_fraction() {
        assert_eq!(format_marks(80.0), "80");
        assert_eq!(format_marks(80.5), "80.5");
    }
}
