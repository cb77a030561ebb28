//! Status codes and enumerations shared with the EncConverters engine.
//!
//! Values follow `ECInterfaces.cs`, the interface definition the ECDriver
//! library is built against. Zero is success, positive values are
//! informational, negative values are errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A status code returned by one of the engine's entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrStatus(pub i32);

impl ErrStatus {
    pub const NO_ERROR: Self = Self(0);

    pub const OUTPUT_BUFFER_FULL: Self = Self(1);
    pub const NEED_MORE_INPUT: Self = Self(2);

    pub const INVALID_FORM: Self = Self(-1);
    pub const CONVERTER_BUSY: Self = Self(-2);
    pub const INVALID_CONVERTER: Self = Self(-3);
    pub const INVALID_MAPPING: Self = Self(-4);
    pub const BAD_MAPPING_VERSION: Self = Self(-5);
    pub const EXCEPTION: Self = Self(-6);
    pub const NAME_NOT_FOUND: Self = Self(-7);
    pub const INCOMPLETE_CHAR: Self = Self(-8);
    pub const COMPILATION_FAILED: Self = Self(-9);
    pub const OUT_OF_MEMORY: Self = Self(-10);
    pub const CANT_OPEN_READ_MAP: Self = Self(-11);
    pub const IN_ENC_FORM_NOT_SUPPORTED: Self = Self(-12);
    pub const OUT_ENC_FORM_NOT_SUPPORTED: Self = Self(-13);
    pub const NO_AVAILABLE_CONVERTERS: Self = Self(-14);
    pub const SYNTAX_ERROR_IN_TABLE: Self = Self(-15);
    pub const NO_ERROR_CODE: Self = Self(-16);
    pub const NOT_ENOUGH_BUFFER: Self = Self(-17);
    pub const REGISTRY_CORRUPT: Self = Self(-18);
    pub const MISSING_CONVERTER: Self = Self(-19);
    pub const NO_CONVERTER: Self = Self(-20);
    pub const INVALID_CONVERSION_TYPE: Self = Self(-21);
    pub const ENCODING_CONV_TYPE_NOT_SPECIFIED: Self = Self(-22);
    pub const CONVERTER_PLUGIN_UNINSTALL: Self = Self(-23);
    pub const INVALID_CHAR_FOUND: Self = Self(-24);
    pub const TRUNCATED_CHAR_FOUND: Self = Self(-25);
    pub const ILLEGAL_CHAR_FOUND: Self = Self(-26);
    pub const INVALID_TABLE_FORMAT: Self = Self(-27);
    pub const NO_RETURN_DATA: Self = Self(-28);
    pub const NO_RETURN_DATA_BAD_OUT_FORM: Self = Self(-29);
    pub const ADD_FONT_FIRST: Self = Self(-30);
    pub const INVALID_NORMALIZE_FORM: Self = Self(-31);
    pub const NO_ALIAS_NAME: Self = Self(-32);
    pub const CONVERTER_ALREADY_EXISTS: Self = Self(-33);
    pub const NO_IMPLEMENT_DETAILS: Self = Self(-34);
    pub const NO_ENCODING_NAME: Self = Self(-35);
    pub const NEED_SPEC_TYPE_INFO: Self = Self(-36);
    pub const INVALID_ALIAS_NAME: Self = Self(-37);
    pub const FALLBACK_TWO_STEPS_REQUIRED: Self = Self(-38);
    pub const FALLBACK_SIMILAR_CONV_TYPE: Self = Self(-39);
    pub const INVALID_MAPPING_NAME: Self = Self(-40);
    pub const INSTALL_FONT: Self = Self(-41);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self == Self::NO_ERROR
    }

    /// What `SelectConverter` returns when the user dismisses the picker.
    pub fn is_cancel(self) -> bool {
        self == Self::INVALID_FORM
    }

    /// Statuses that mean the output buffer was too small.
    pub fn is_buffer_overflow(self) -> bool {
        self == Self::OUTPUT_BUFFER_FULL || self == Self::NOT_ENOUGH_BUFFER
    }

    /// Human-readable name for the codes users commonly hit.
    pub fn description(self) -> Option<&'static str> {
        match self {
            Self::EXCEPTION => Some("Exception"),
            Self::INVALID_CONVERSION_TYPE => Some("Invalid Conversion Type"),
            Self::NAME_NOT_FOUND => Some("Converter Name Not Found"),
            Self::REGISTRY_CORRUPT => Some("Registry Corrupt"),
            Self::NOT_ENOUGH_BUFFER => Some("Not Enough Buffer"),
            Self::NO_AVAILABLE_CONVERTERS => Some("No Available Converters"),
            Self::CONVERTER_ALREADY_EXISTS => Some("Converter Already Exists"),
            _ => None,
        }
    }
}

impl fmt::Display for ErrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(desc) => write!(f, "{} ({desc})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<i32> for ErrStatus {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// Conversion type passed to `AddConverter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ConvType {
    Unknown = 0,
    LegacyToFromUnicode = 1,
    LegacyToFromLegacy = 2,
    UnicodeToFromLegacy = 3,
    UnicodeToFromUnicode = 4,
    LegacyToUnicode = 5,
    LegacyToLegacy = 6,
    UnicodeToLegacy = 7,
    UnicodeToUnicode = 8,
}

impl ConvType {
    pub const ALL: [ConvType; 9] = [
        ConvType::Unknown,
        ConvType::LegacyToFromUnicode,
        ConvType::LegacyToFromLegacy,
        ConvType::UnicodeToFromLegacy,
        ConvType::UnicodeToFromUnicode,
        ConvType::LegacyToUnicode,
        ConvType::LegacyToLegacy,
        ConvType::UnicodeToLegacy,
        ConvType::UnicodeToUnicode,
    ];

    /// Whether converters of this type can also run in reverse.
    pub fn is_bidirectional(self) -> bool {
        matches!(
            self,
            ConvType::LegacyToFromUnicode
                | ConvType::LegacyToFromLegacy
                | ConvType::UnicodeToFromLegacy
                | ConvType::UnicodeToFromUnicode
        )
    }

    /// Parse the engine's own spelling, e.g. `"Legacy_to_from_Unicode"`.
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|t| format!("{t:?}").to_ascii_lowercase() == wanted)
    }
}

/// Implementation-type flags passed to `AddConverter`.
///
/// A bit set; combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessTypeFlags(pub u16);

impl ProcessTypeFlags {
    pub const DONT_KNOW: Self = Self(0x0000);
    pub const UNICODE_ENCODING_CONVERSION: Self = Self(0x0001);
    pub const TRANSLITERATION: Self = Self(0x0002);
    pub const ICU_TRANSLITERATION: Self = Self(0x0004);
    pub const ICU_CONVERTER: Self = Self(0x0008);
    pub const CODE_PAGE_CONVERSION: Self = Self(0x0010);
    pub const NON_UNICODE_ENCODING_CONVERSION: Self = Self(0x0020);
    pub const SPELLING_FIXER_PROJECT: Self = Self(0x0040);
    pub const ICU_REGULAR_EXPRESSION: Self = Self(0x0080);
    pub const PYTHON_SCRIPT: Self = Self(0x0100);
    pub const PERL_EXPRESSION: Self = Self(0x0200);
    pub const USER_DEFINED_SPARE1: Self = Self(0x0400);
    pub const USER_DEFINED_SPARE2: Self = Self(0x0800);

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ProcessTypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
