//! Safe calls into a bound driver.
//!
//! An [`Engine`] exists only while its [`BoundLibrary`](crate::binder::BoundLibrary)
//! is alive and only if every required entry point resolved, so the methods
//! here never check for missing symbols. Each one owns the marshalling for
//! its call and turns the returned status into a typed result.

use tracing::{debug, trace};

use crate::binder::{
    Bool, ConvertStringFn, EntryPoints, InitializeConverterFn, IsInstalledFn, SelectConverterFn,
    symbols,
};
use crate::error::EcError;
use crate::settings::ConverterSettings;
use crate::status::{ConvType, ErrStatus, ProcessTypeFlags};
use crate::text::{NAME_CAPACITY, OutputBuffer, to_engine};

/// Parameters for registering a new converter with the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConverter {
    /// Friendly name the converter will be looked up by.
    pub name: String,
    /// Technical spec, e.g. the map file path for TECkit or CC.
    pub spec: String,
    pub conv_type: ConvType,
    /// Technical name of the left-hand encoding, e.g. `SIL-ANNAPURNA-05`.
    pub left_encoding: String,
    /// Technical name of the right-hand encoding, e.g. `UNICODE`.
    pub right_encoding: String,
    pub process_type: ProcessTypeFlags,
}

/// Callable view of a fully resolved entry-point table.
#[derive(Debug, Clone, Copy)]
pub struct Engine<'a> {
    is_installed: IsInstalledFn,
    select_converter: SelectConverterFn,
    initialize_converter: InitializeConverterFn,
    convert_string: ConvertStringFn,
    table: &'a EntryPoints,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(table: &'a EntryPoints) -> Option<Self> {
        Some(Self {
            is_installed: table.is_installed?,
            select_converter: table.select_converter?,
            initialize_converter: table.initialize_converter?,
            convert_string: table.convert_string?,
            table,
        })
    }

    pub fn is_installed(&self) -> bool {
        // SAFETY: no arguments; the module is mapped for `'a`.
        let installed = unsafe { (self.is_installed)() } != 0;
        trace!(installed, "IsEcInstalled");
        installed
    }

    /// Run the interactive picker. Blocks until the user closes it.
    pub fn select_converter(&self) -> Result<ConverterSettings, EcError> {
        let mut name = OutputBuffer::new(NAME_CAPACITY);
        let mut forward: Bool = 1;
        let mut norm_form: i32 = 0;

        debug!("calling SelectConverter");
        // SAFETY: `name` is a zeroed buffer of NAME_CAPACITY + 1 units, and
        // both in/out parameters point at live locals.
        let status = ErrStatus(unsafe {
            (self.select_converter)(name.as_mut_ptr(), &mut forward, &mut norm_form)
        });

        if status.is_cancel() {
            debug!(%status, "user probably pressed Cancel");
            return Err(EcError::SelectionCancelled);
        }
        if !status.is_ok() {
            return Err(EcError::SelectionFailed { status });
        }
        let name = name.read()?;
        if name.is_empty() {
            return Err(EcError::NoConverterSpecified);
        }
        debug!(name, forward, norm_form, "converter selected");
        Ok(ConverterSettings {
            name,
            forward: forward != 0,
            norm_form,
        })
    }

    /// Activate `settings` without user interaction.
    pub fn initialize_converter(&self, settings: &ConverterSettings) -> Result<(), EcError> {
        let name = to_engine("converter name", &settings.name)?;
        debug!(%settings, "calling InitializeConverter");
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let status = ErrStatus(unsafe {
            (self.initialize_converter)(
                name.as_ptr(),
                Bool::from(settings.forward),
                settings.norm_form,
            )
        });
        if status.is_ok() {
            Ok(())
        } else {
            Err(EcError::InitializationFailed {
                name: settings.name.clone(),
                status,
            })
        }
    }

    /// Convert `input` with the converter called `name`.
    ///
    /// Results of `capacity` code units or more are rejected as truncated.
    pub fn convert_string(
        &self,
        name: &str,
        input: &str,
        capacity: usize,
    ) -> Result<String, EcError> {
        let c_name = to_engine("converter name", name)?;
        let c_input = to_engine("input text", input)?;
        let mut output = OutputBuffer::new(capacity);

        trace!(name, input, "calling ConvertString");
        // SAFETY: both inputs are NUL-terminated; `output` really holds
        // `engine_len()` units.
        let status = ErrStatus(unsafe {
            (self.convert_string)(
                c_name.as_ptr(),
                c_input.as_ptr(),
                output.as_mut_ptr(),
                output.engine_len(),
            )
        });

        if status.is_buffer_overflow() {
            return Err(EcError::OutputTruncated { capacity });
        }
        if !status.is_ok() {
            return Err(EcError::ConversionFailed {
                name: name.to_string(),
                status,
            });
        }
        let converted = output.read()?;
        trace!(output = converted, "ConvertString result");
        Ok(converted)
    }

    /// The repository's description of converter `name`.
    pub fn describe_converter(&self, name: &str, capacity: usize) -> Result<String, EcError> {
        let describe = self
            .table
            .describe_converter
            .ok_or(EcError::EntryPointUnavailable {
                symbol: symbols::DESCRIBE_CONVERTER,
                hint: "Converter descriptions need a newer EncConverters.",
            })?;
        let c_name = to_engine("converter name", name)?;
        let mut output = OutputBuffer::new(capacity);

        // SAFETY: `c_name` is NUL-terminated; `output` holds `engine_len()` units.
        let status = ErrStatus(unsafe {
            describe(c_name.as_ptr(), output.as_mut_ptr(), output.engine_len())
        });
        if status.is_buffer_overflow() {
            return Err(EcError::OutputTruncated { capacity });
        }
        if !status.is_ok() {
            return Err(EcError::EngineError {
                operation: "describe converter",
                status,
            });
        }
        output.read()
    }

    /// Register a new converter in the repository.
    pub fn add_converter(&self, new: &NewConverter) -> Result<(), EcError> {
        let add = self.table.add_converter.ok_or(EcError::EntryPointUnavailable {
            symbol: symbols::ADD_CONVERTER,
            hint: "Automatically adding a converter requires SEC 4.0 or higher.",
        })?;
        if new.name.is_empty() {
            return Err(EcError::NoConverterSpecified);
        }
        let c_name = to_engine("converter name", &new.name)?;
        let c_spec = to_engine("converter spec", &new.spec)?;
        let c_left = to_engine("left encoding", &new.left_encoding)?;
        let c_right = to_engine("right encoding", &new.right_encoding)?;

        debug!(?new, "calling AddConverter");
        // SAFETY: all string arguments are NUL-terminated and outlive the call.
        let status = ErrStatus(unsafe {
            add(
                c_name.as_ptr(),
                c_spec.as_ptr(),
                new.conv_type as u16,
                c_left.as_ptr(),
                c_right.as_ptr(),
                new.process_type.bits(),
            )
        });
        if status.is_ok() {
            Ok(())
        } else {
            Err(EcError::EngineError {
                operation: "add converter",
                status,
            })
        }
    }
}
