//! Column number formats

/// Number format of a column
///
/// Built-in formats are referenced by their fixed ID and never written to the
/// stylesheet. Custom codes are interned and receive an ID of
/// [`FIRST_CUSTOM_ID`](NumberFormat::FIRST_CUSTOM_ID) or above.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumberFormat {
    BuiltIn(u32),
    Custom(String),
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::general()
    }
}

impl NumberFormat {
    /// `General`
    pub const ID_GENERAL: u32 = 0;
    /// `0`
    pub const ID_INTEGER: u32 = 1;
    /// `0.00`
    pub const ID_DECIMAL: u32 = 2;
    /// `#,##0.00`
    pub const ID_THOUSANDS_DECIMAL: u32 = 4;
    /// `0%`
    pub const ID_PERCENT: u32 = 9;
    /// `mm-dd-yy`, applied to date columns without a format of their own
    pub const ID_DATE_SHORT: u32 = 14;
    /// `m/d/yy h:mm`
    pub const ID_DATETIME: u32 = 22;
    /// `@`
    pub const ID_TEXT: u32 = 49;

    /// Lowest ID handed out to custom format codes
    pub const FIRST_CUSTOM_ID: u32 = 165;

    pub fn custom<S: Into<String>>(code: S) -> Self {
        NumberFormat::Custom(code.into())
    }

    pub fn general() -> Self {
        NumberFormat::BuiltIn(Self::ID_GENERAL)
    }

    pub fn integer() -> Self {
        NumberFormat::BuiltIn(Self::ID_INTEGER)
    }

    pub fn decimal() -> Self {
        NumberFormat::BuiltIn(Self::ID_DECIMAL)
    }

    pub fn thousands_decimal() -> Self {
        NumberFormat::BuiltIn(Self::ID_THOUSANDS_DECIMAL)
    }

    pub fn percent() -> Self {
        NumberFormat::BuiltIn(Self::ID_PERCENT)
    }

    pub fn date_short() -> Self {
        NumberFormat::BuiltIn(Self::ID_DATE_SHORT)
    }

    pub fn datetime() -> Self {
        NumberFormat::BuiltIn(Self::ID_DATETIME)
    }

    pub fn text() -> Self {
        NumberFormat::BuiltIn(Self::ID_TEXT)
    }

    /// ID of a built-in format, `None` for custom codes
    pub fn builtin_id(&self) -> Option<u32> {
        match self {
            NumberFormat::BuiltIn(id) => Some(*id),
            NumberFormat::Custom(_) => None,
        }
    }

    /// Code of a custom format, `None` for built-ins
    pub fn custom_code(&self) -> Option<&str> {
        match self {
            NumberFormat::BuiltIn(_) => None,
            NumberFormat::Custom(code) => Some(code),
        }
    }
}
