//! Font style types

/// Font settings for a column or header row
///
/// Text color is configured separately (`foreground_color`) so that one font
/// description can be reused with several colors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontStyle {
    pub name: String,
    /// Points
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            name: "Calibri".to_string(),
            size: 11.0,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
        }
    }
}

impl FontStyle {
    /// Calibri 11
    pub fn new() -> Self {
        Self::default()
    }

    /// Bold Calibri 11, used for header rows
    pub fn header() -> Self {
        Self::default().with_bold(true)
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    pub fn with_underline(mut self, underline: bool) -> Self {
        self.underline = underline;
        self
    }

    pub fn with_strikethrough(mut self, strikethrough: bool) -> Self {
        self.strikethrough = strikethrough;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_font_is_bold_default() {
        let header = FontStyle::header();
        assert!(header.bold);
        assert_eq!(header, FontStyle::new().with_bold(true));
        assert_ne!(header.clone().with_size(12.0), header);
    }
}
