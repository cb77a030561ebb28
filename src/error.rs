//! Actionable typed errors for ecconv.
//!
//! The session recovers every one of these locally: the host-facing
//! surface turns them into `false` / empty-string results and keeps the
//! error around as a diagnostic. The typed `try_*` API returns them as-is.

use std::path::PathBuf;

use crate::status::ErrStatus;

/// Errors raised while loading the engine module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// No candidate module could be loaded by the OS loader.
    #[error(
        "Could not load the EncConverters driver. Tried: {}. Last error: {detail}. Install EncConverters or set ECCONV_LIBRARY.",
        tried.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    ModuleNotFound { tried: Vec<PathBuf>, detail: String },
}

/// Errors that ecconv surfaces to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcError {
    /// The engine module is absent.
    #[error(transparent)]
    ModuleNotFound(#[from] BindError),

    /// The module loaded but lacks required entry points.
    #[error("EncConverters driver is missing entry points: {}", missing.join(", "))]
    SymbolMissing { missing: Vec<String> },

    /// The session could not obtain a complete entry-point table.
    #[error("EncConverters is unavailable: {reason}")]
    EngineUnavailable { reason: String },

    /// `IsEcInstalled` reported false.
    #[error("EncConverters does not seem to be installed properly.")]
    EngineNotInstalled,

    /// The user dismissed the converter picker.
    #[error("Converter selection was cancelled.")]
    SelectionCancelled,

    /// The picker returned a status other than success or cancel.
    #[error("Error: EncConverters returned {status} while selecting a converter.")]
    SelectionFailed { status: ErrStatus },

    /// `InitializeConverter` rejected the requested converter.
    #[error(
        "Could not initialize converter '{name}': EncConverters returned {status}. Check the name and try again."
    )]
    InitializationFailed { name: String, status: ErrStatus },

    /// Conversion attempted without a selected or initialized converter.
    #[error("No converter was specified. Pick or set a converter first.")]
    NoActiveConverter,

    /// `ConvertString` returned a non-success status.
    #[error("Error: EncConverters returned {status} converting with '{name}'.")]
    ConversionFailed { name: String, status: ErrStatus },

    /// The converted text did not fit in the output buffer.
    #[error(
        "Converted text does not fit in {capacity} code units. Split the input or raise ECCONV_OUTPUT_CAPACITY."
    )]
    OutputTruncated { capacity: usize },

    /// An empty converter name was given.
    #[error("No converter was specified.")]
    NoConverterSpecified,

    /// Text cannot be passed to the engine (e.g. contains NUL).
    #[error("Cannot pass {what} to EncConverters: {detail}")]
    InvalidText { what: &'static str, detail: String },

    /// An optional entry point this operation needs is not exported.
    #[error("EncConverters driver does not export {symbol}. {hint}")]
    EntryPointUnavailable {
        symbol: &'static str,
        hint: &'static str,
    },

    /// Any other non-success status from an optional entry point.
    #[error("Error: EncConverters returned {status} during {operation}.")]
    EngineError {
        operation: &'static str,
        status: ErrStatus,
    },
}

impl EcError {
    /// Stable identifier for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            EcError::ModuleNotFound(_) => "module_not_found",
            EcError::SymbolMissing { .. } => "symbol_missing",
            EcError::EngineUnavailable { .. } => "engine_unavailable",
            EcError::EngineNotInstalled => "engine_not_installed",
            EcError::SelectionCancelled => "selection_cancelled",
            EcError::SelectionFailed { .. } => "selection_failed",
            EcError::InitializationFailed { .. } => "initialization_failed",
            EcError::NoActiveConverter => "no_active_converter",
            EcError::ConversionFailed { .. } => "conversion_failed",
            EcError::OutputTruncated { .. } => "output_truncated",
            EcError::NoConverterSpecified => "no_converter_specified",
            EcError::InvalidText { .. } => "invalid_text",
            EcError::EntryPointUnavailable { .. } => "entry_point_unavailable",
            EcError::EngineError { .. } => "engine_error",
        }
    }

    /// Normal negative outcomes that are not worth a warning.
    pub fn is_benign(&self) -> bool {
        matches!(self, EcError::SelectionCancelled)
    }
}
