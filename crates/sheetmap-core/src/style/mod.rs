//! Column and worksheet styling
//!
//! Plain configuration values consumed by the worksheet writer:
//! - [`ColumnStyle`] - look of the data cells in one column
//! - [`WorksheetStyle`] - header row look and sheet-wide layout switches
//! - [`FontStyle`], [`Color`], [`BorderPlacement`], [`PatternType`],
//!   [`NumberFormat`] - the building blocks of both

mod alignment;
mod border;
mod color;
mod fill;
mod font;
mod number_format;

pub use alignment::{HorizontalAlignment, VerticalAlignment};
pub use border::{BorderLineStyle, BorderPlacement};
pub use color::Color;
pub use fill::PatternType;
pub use font::FontStyle;
pub use number_format::NumberFormat;

/// Look of the data cells in one column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnStyle {
    pub background_color: Color,
    pub background_pattern: PatternType,
    pub border_color: Color,
    pub border_placement: BorderPlacement,
    pub border_line: BorderLineStyle,
    pub font: FontStyle,
    /// Text color
    pub foreground_color: Color,
    pub horizontal_alignment: HorizontalAlignment,
    pub vertical_alignment: VerticalAlignment,
    /// `None` lets the writer pick: short date for date columns, General otherwise
    pub number_format: Option<NumberFormat>,
}

impl Default for ColumnStyle {
    fn default() -> Self {
        Self {
            background_color: Color::TRANSPARENT,
            background_pattern: PatternType::None,
            border_color: Color::BLACK,
            border_placement: BorderPlacement::NONE,
            border_line: BorderLineStyle::None,
            font: FontStyle::default(),
            foreground_color: Color::BLACK,
            horizontal_alignment: HorizontalAlignment::General,
            vertical_alignment: VerticalAlignment::Center,
            number_format: None,
        }
    }
}

impl ColumnStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Background fill; the color only shows with a pattern other than `None`
    pub fn with_background(mut self, color: Color, pattern: PatternType) -> Self {
        self.background_color = color;
        self.background_pattern = pattern;
        self
    }

    pub fn with_border(
        mut self,
        placement: BorderPlacement,
        line: BorderLineStyle,
        color: Color,
    ) -> Self {
        self.border_placement = placement;
        self.border_line = line;
        self.border_color = color;
        self
    }

    pub fn with_font(mut self, font: FontStyle) -> Self {
        self.font = font;
        self
    }

    pub fn with_foreground_color(mut self, color: Color) -> Self {
        self.foreground_color = color;
        self
    }

    pub fn with_horizontal_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.horizontal_alignment = alignment;
        self
    }

    pub fn with_vertical_alignment(mut self, alignment: VerticalAlignment) -> Self {
        self.vertical_alignment = alignment;
        self
    }

    pub fn with_number_format(mut self, format: NumberFormat) -> Self {
        self.number_format = Some(format);
        self
    }
}

/// Header row look and sheet-wide layout switches for a written worksheet
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorksheetStyle {
    pub header_background_color: Color,
    pub header_background_pattern: PatternType,
    pub header_font: FontStyle,
    pub header_foreground_color: Color,
    pub header_horizontal_alignment: HorizontalAlignment,
    pub header_vertical_alignment: VerticalAlignment,
    /// 1-based row the header is written to
    pub header_row_index: u32,
    pub min_column_width: f64,
    pub max_column_width: f64,
    pub should_auto_filter: bool,
    /// Size columns to their longest text; requires rewriting the column prologue on finish
    pub should_auto_fit_columns: bool,
    pub should_freeze_header_row: bool,
    pub should_write_header_row: bool,
}

impl Default for WorksheetStyle {
    fn default() -> Self {
        Self {
            header_background_color: Color::TRANSPARENT,
            header_background_pattern: PatternType::None,
            header_font: FontStyle::header(),
            header_foreground_color: Color::BLACK,
            header_horizontal_alignment: HorizontalAlignment::General,
            header_vertical_alignment: VerticalAlignment::Center,
            header_row_index: 1,
            min_column_width: 5.0,
            max_column_width: 30.0,
            should_auto_filter: false,
            should_auto_fit_columns: false,
            should_freeze_header_row: false,
            should_write_header_row: true,
        }
    }
}

impl WorksheetStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header_background(mut self, color: Color, pattern: PatternType) -> Self {
        self.header_background_color = color;
        self.header_background_pattern = pattern;
        self
    }

    pub fn with_header_font(mut self, font: FontStyle) -> Self {
        self.header_font = font;
        self
    }

    pub fn with_header_foreground_color(mut self, color: Color) -> Self {
        self.header_foreground_color = color;
        self
    }

    pub fn with_header_alignment(
        mut self,
        horizontal: HorizontalAlignment,
        vertical: VerticalAlignment,
    ) -> Self {
        self.header_horizontal_alignment = horizontal;
        self.header_vertical_alignment = vertical;
        self
    }

    pub fn with_header_row_index(mut self, index: u32) -> Self {
        self.header_row_index = index;
        self
    }

    /// Clamp range for column widths, in characters
    pub fn with_column_width_range(mut self, min: f64, max: f64) -> Self {
        self.min_column_width = min;
        self.max_column_width = max;
        self
    }

    pub fn with_auto_filter(mut self, enabled: bool) -> Self {
        self.should_auto_filter = enabled;
        self
    }

    pub fn with_auto_fit_columns(mut self, enabled: bool) -> Self {
        self.should_auto_fit_columns = enabled;
        self
    }

    pub fn with_freeze_header_row(mut self, enabled: bool) -> Self {
        self.should_freeze_header_row = enabled;
        self
    }

    pub fn with_write_header_row(mut self, enabled: bool) -> Self {
        self.should_write_header_row = enabled;
        self
    }
}
