//! ecconv — runtime binding to SIL EncConverters.
//!
//! Loads the ECDriver library (`ECDriver.dll` on Windows, `libecdriver.so`
//! elsewhere), resolves its C entry points, and drives converter selection
//! and text conversion through a [`ConverterSession`](session::ConverterSession).
//! The binary (`main.rs`) is a thin CLI wrapper around this library.

pub mod binder;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod settings;
pub mod status;
pub mod text;

pub use binder::{BoundLibrary, DynamicBinder, EntryPoints, LibraryBinder, ModuleLocator};
pub use error::{BindError, EcError};
pub use session::ConverterSession;
pub use settings::ConverterSettings;
