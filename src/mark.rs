//! Mark definitions
//!
//! A mark is one placeable graphical entity on the marking canvas. Every mark
//! shares a [`MarkBase`] (position and interaction flags) and adds the
//! attributes of its variant. Mark payloads such as text or code content are
//! opaque strings produced elsewhere; this crate only stores them.
//!
//! Marks carry no back-reference to the document. They are owned by the
//! ordered list that holds them, and that order is the z-order.
//!
//! ## Examples
//!
//! ```rust
//! use marksnap::mark::{Mark, MarkBase, TextMark};
//!
//! let mark = Mark::Text(TextMark::new(MarkBase::at(10, 20), "A1"));
//! assert_eq!(mark.position(), (10, 20));
//! assert_eq!(mark.kind_name(), "text");
//! ```

use serde::{Deserialize, Serialize};

/// Attributes every mark has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkBase {
    /// Horizontal canvas position
    pub x: i32,
    /// Vertical canvas position
    pub y: i32,
    /// Whether the mark can be dragged
    #[serde(default = "enabled")]
    pub drag_enabled: bool,
    /// Whether the mark can be resized
    #[serde(default = "enabled")]
    pub resize_enabled: bool,
}

fn enabled() -> bool {
    true
}

impl MarkBase {
    /// Base at the given position with dragging and resizing enabled
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            drag_enabled: true,
            resize_enabled: true,
        }
    }
}

impl Default for MarkBase {
    fn default() -> Self {
        Self::at(0, 0)
    }
}

/// Plain text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMark {
    #[serde(flatten)]
    pub base: MarkBase,
    pub text: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub letter_spacing: i32,
}

fn default_font_family() -> String {
    "Sans".to_string()
}

fn default_font_size() -> u32 {
    12
}

impl TextMark {
    /// Text mark with default font settings
    pub fn new(base: MarkBase, text: impl Into<String>) -> Self {
        Self {
            base,
            text: text.into(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            bold: false,
            italic: false,
            letter_spacing: 0,
        }
    }
}

/// Text laid out along an arc
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowTextMark {
    #[serde(flatten)]
    pub base: MarkBase,
    pub text: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Arc radius in canvas units
    pub radius: u32,
    /// Angle of the first glyph, in degrees
    #[serde(default)]
    pub start_angle: f64,
    #[serde(default = "enabled")]
    pub clockwise: bool,
}

/// Two-dimensional code symbology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSymbology {
    DataMatrix,
    QrCode,
}

/// Matrix code (DataMatrix, QR)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMatrixMark {
    #[serde(flatten)]
    pub base: MarkBase,
    /// Encoded payload
    pub content: String,
    pub symbology: CodeSymbology,
    /// Edge length of one module (dot) in canvas units
    pub module_size: u32,
    #[serde(default)]
    pub quiet_zone: u32,
}

/// Primitive outline shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphShape {
    Rectangle,
    Ellipse,
    Triangle,
}

/// Geometric shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMark {
    #[serde(flatten)]
    pub base: MarkBase,
    pub shape: GraphShape,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub filled: bool,
    #[serde(default = "default_thickness")]
    pub line_thickness: u32,
}

fn default_thickness() -> u32 {
    1
}

/// Imported picture or logo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMark {
    #[serde(flatten)]
    pub base: MarkBase,
    /// Opaque reference to the picture source
    pub source: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "enabled")]
    pub keep_aspect_ratio: bool,
}

/// Stroke pattern for lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

/// Straight line from the base position to `(end_x, end_y)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMark {
    #[serde(flatten)]
    pub base: MarkBase,
    pub end_x: i32,
    pub end_y: i32,
    #[serde(default = "default_thickness")]
    pub thickness: u32,
    #[serde(default = "default_line_style")]
    pub style: LineStyle,
}

fn default_line_style() -> LineStyle {
    LineStyle::Solid
}

/// Ruler direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Graduated ruler scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulerMark {
    #[serde(flatten)]
    pub base: MarkBase,
    /// Total length along the orientation axis
    pub length: u32,
    /// Extent across the orientation axis
    pub height: u32,
    /// Distance between two minor graduations
    pub scale_size: u32,
    /// Value represented by one graduation
    pub scale_value: f64,
    /// Value printed at the first graduation
    pub start_value: f64,
    /// Number of graduations between major lines
    pub span_length: u32,
    pub major_line_height: u32,
    pub middle_line_height: u32,
    pub minor_line_height: u32,
    #[serde(default = "enabled")]
    pub show_numbers: bool,
    #[serde(default)]
    pub numbers_above: bool,
    /// 0xRRGGBB
    #[serde(default)]
    pub color: u32,
    #[serde(default = "default_thickness")]
    pub thickness: u32,
    pub orientation: Orientation,
}

impl RulerMark {
    /// Horizontal ruler with common graduation settings
    pub fn new(base: MarkBase, length: u32) -> Self {
        Self {
            base,
            length,
            height: 40,
            scale_size: 10,
            scale_value: 1.0,
            start_value: 0.0,
            span_length: 10,
            major_line_height: 30,
            middle_line_height: 20,
            minor_line_height: 10,
            show_numbers: true,
            numbers_above: false,
            color: 0x000000,
            thickness: 1,
            orientation: Orientation::Horizontal,
        }
    }
}

/// Region the marking head must not touch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvoidPointMark {
    #[serde(flatten)]
    pub base: MarkBase,
    pub radius: u32,
}

/// A placeable mark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mark {
    Text(TextMark),
    BowText(BowTextMark),
    CodeMatrix(CodeMatrixMark),
    Graph(GraphMark),
    Chart(ChartMark),
    Line(LineMark),
    Ruler(RulerMark),
    AvoidPoint(AvoidPointMark),
}

impl Mark {
    /// Shared attributes
    pub fn base(&self) -> &MarkBase {
        match self {
            Mark::Text(m) => &m.base,
            Mark::BowText(m) => &m.base,
            Mark::CodeMatrix(m) => &m.base,
            Mark::Graph(m) => &m.base,
            Mark::Chart(m) => &m.base,
            Mark::Line(m) => &m.base,
            Mark::Ruler(m) => &m.base,
            Mark::AvoidPoint(m) => &m.base,
        }
    }

    /// Shared attributes, mutably
    pub fn base_mut(&mut self) -> &mut MarkBase {
        match self {
            Mark::Text(m) => &mut m.base,
            Mark::BowText(m) => &mut m.base,
            Mark::CodeMatrix(m) => &mut m.base,
            Mark::Graph(m) => &mut m.base,
            Mark::Chart(m) => &mut m.base,
            Mark::Line(m) => &mut m.base,
            Mark::Ruler(m) => &mut m.base,
            Mark::AvoidPoint(m) => &mut m.base,
        }
    }

    /// Canvas position as `(x, y)`
    pub fn position(&self) -> (i32, i32) {
        let base = self.base();
        (base.x, base.y)
    }

    /// Move the mark to a new position
    pub fn move_to(&mut self, x: i32, y: i32) {
        let base = self.base_mut();
        base.x = x;
        base.y = y;
    }

    /// Serialized variant tag
    pub fn kind_name(&self) -> &'static str {
        match self {
            Mark::Text(_) => "text",
            Mark::BowText(_) => "bow_text",
            Mark::CodeMatrix(_) => "code_matrix",
            Mark::Graph(_) => "graph",
            Mark::Chart(_) => "chart",
            Mark::Line(_) => "line",
            Mark::Ruler(_) => "ruler",
            Mark::AvoidPoint(_) => "avoid_point",
        }
    }

    /// The text mark inside, if this is one
    pub fn as_text(&self) -> Option<&TextMark> {
        match self {
            Mark::Text(m) => Some(m),
            _ => None,
        }
    }
}

impl From<TextMark> for Mark {
    fn from(mark: TextMark) -> Self {
        Mark::Text(mark)
    }
}

impl From<RulerMark> for Mark {
    fn from(mark: RulerMark) -> Self {
        Mark::Ruler(mark)
    }
}
