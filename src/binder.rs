//! Loading the ECDriver module and resolving its entry points.
//!
//! Binding produces a [`BoundLibrary`]: a capability table of optional
//! function pointers plus ownership of the loaded module. The module stays
//! mapped until the `BoundLibrary` is dropped, and the only way to call an
//! entry point is through an [`Engine`] that borrows it, so no call can
//! outlive the unload.

use std::fmt;
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::{debug, info, trace, warn};

use crate::engine::Engine;
use crate::error::{BindError, EcError};
use crate::text::EcChar;

/// Win32 `BOOL`.
pub type Bool = i32;

pub type IsInstalledFn = unsafe extern "system" fn() -> Bool;
pub type SelectConverterFn =
    unsafe extern "system" fn(name: *mut EcChar, forward: *mut Bool, norm_form: *mut i32) -> i32;
pub type InitializeConverterFn =
    unsafe extern "system" fn(name: *const EcChar, forward: Bool, norm_form: i32) -> i32;
pub type ConvertStringFn = unsafe extern "system" fn(
    name: *const EcChar,
    input: *const EcChar,
    output: *mut EcChar,
    output_len: i32,
) -> i32;
pub type DescribeConverterFn =
    unsafe extern "system" fn(name: *const EcChar, description: *mut EcChar, len: i32) -> i32;
pub type AddConverterFn = unsafe extern "system" fn(
    name: *const EcChar,
    spec: *const EcChar,
    conv_type: u16,
    left_encoding: *const EcChar,
    right_encoding: *const EcChar,
    process_type: u16,
) -> i32;
pub type CleanupFn = unsafe extern "system" fn();

/// Exported symbol names. The Windows driver uses `W`-suffixed wide-string
/// variants.
pub mod symbols {
    pub const IS_INSTALLED: &str = "IsEcInstalled";
    pub const CLEANUP: &str = "Cleanup";

    #[cfg(windows)]
    pub const SELECT_CONVERTER: &str = "EncConverterSelectConverterW";
    #[cfg(windows)]
    pub const INITIALIZE_CONVERTER: &str = "EncConverterInitializeConverterW";
    #[cfg(windows)]
    pub const CONVERT_STRING: &str = "EncConverterConvertStringW";
    #[cfg(windows)]
    pub const DESCRIBE_CONVERTER: &str = "EncConverterConverterDescriptionW";
    #[cfg(windows)]
    pub const ADD_CONVERTER: &str = "EncConverterAddConverterW";

    #[cfg(not(windows))]
    pub const SELECT_CONVERTER: &str = "EncConverterSelectConverter";
    #[cfg(not(windows))]
    pub const INITIALIZE_CONVERTER: &str = "EncConverterInitializeConverter";
    #[cfg(not(windows))]
    pub const CONVERT_STRING: &str = "EncConverterConvertString";
    #[cfg(not(windows))]
    pub const DESCRIBE_CONVERTER: &str = "EncConverterConverterDescription";
    #[cfg(not(windows))]
    pub const ADD_CONVERTER: &str = "EncConverterAddConverter";
}

/// Runtime-resolved entry points; each is `None` if the module lacks it.
///
/// The first four are required for any converter work. The rest are
/// optional extras exported by newer drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryPoints {
    pub is_installed: Option<IsInstalledFn>,
    pub select_converter: Option<SelectConverterFn>,
    pub initialize_converter: Option<InitializeConverterFn>,
    pub convert_string: Option<ConvertStringFn>,
    pub describe_converter: Option<DescribeConverterFn>,
    pub add_converter: Option<AddConverterFn>,
    pub cleanup: Option<CleanupFn>,
}

impl EntryPoints {
    /// Names of required entry points that did not resolve.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.is_installed.is_none() {
            missing.push(symbols::IS_INSTALLED);
        }
        if self.select_converter.is_none() {
            missing.push(symbols::SELECT_CONVERTER);
        }
        if self.initialize_converter.is_none() {
            missing.push(symbols::INITIALIZE_CONVERTER);
        }
        if self.convert_string.is_none() {
            missing.push(symbols::CONVERT_STRING);
        }
        missing
    }

    pub fn all_resolved(&self) -> bool {
        self.missing_required().is_empty()
    }
}

/// A loaded engine module together with its resolved entry points.
pub struct BoundLibrary {
    entry_points: EntryPoints,
    path: Option<PathBuf>,
    library: Option<Library>,
}

impl BoundLibrary {
    /// Wrap a table of in-process entry points. No module is owned.
    pub fn from_entry_points(entry_points: EntryPoints) -> Self {
        Self {
            entry_points,
            path: None,
            library: None,
        }
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entry_points
    }

    /// Path the module was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn all_resolved(&self) -> bool {
        self.entry_points.all_resolved()
    }

    pub fn missing_symbols(&self) -> Vec<&'static str> {
        self.entry_points.missing_required()
    }

    /// A callable view over the entry points, if all required ones resolved.
    pub fn engine(&self) -> Result<Engine<'_>, EcError> {
        Engine::new(&self.entry_points).ok_or_else(|| EcError::SymbolMissing {
            missing: self
                .missing_symbols()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}

impl fmt::Debug for BoundLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundLibrary")
            .field("path", &self.path)
            .field("loaded", &self.library.is_some())
            .field("missing", &self.missing_symbols())
            .finish()
    }
}

impl Drop for BoundLibrary {
    fn drop(&mut self) {
        if let Some(cleanup) = self.entry_points.cleanup {
            debug!("calling engine Cleanup before unload");
            // SAFETY: `Cleanup` takes no arguments, and the module it lives
            // in is still mapped; `library` is dropped after this body.
            unsafe { cleanup() };
        }
        if self.library.is_some() {
            debug!(path = ?self.path, "unloading EncConverters driver");
        }
    }
}

/// The seam a session binds through.
pub trait LibraryBinder {
    /// Load the engine module and resolve its entry points.
    ///
    /// Missing symbols are not an error here; they show up as `None`
    /// entries in the returned table.
    fn bind(&mut self) -> Result<BoundLibrary, BindError>;
}

// ---------------------------------------------------------------------------
// Module location
// ---------------------------------------------------------------------------

/// Where to look for the driver module.
#[derive(Debug, Clone, Default)]
pub struct ModuleLocator {
    /// Explicit path that replaces the default search.
    pub explicit: Option<PathBuf>,
}

#[cfg(windows)]
pub const MODULE_NAME: &str = "ECDriver.dll";
#[cfg(not(windows))]
pub const MODULE_NAME: &str = "libecdriver.so";

impl ModuleLocator {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Candidate module paths, in the order they are tried.
    ///
    /// On Linux, EncConverters and FieldWorks install the driver under
    /// `lib/encConverters` or `lib/fieldworks`; anything found there is
    /// preferred, then the bare name is left to the OS loader
    /// (`LD_LIBRARY_PATH`, ldconfig). Windows relies on the DLL search path.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.explicit {
            return vec![path.clone()];
        }
        let mut found: Vec<PathBuf> = Self::search_paths()
            .into_iter()
            .filter(|p| p.is_file())
            .collect();
        trace!(?found, "driver modules found on search path");
        found.push(PathBuf::from(MODULE_NAME));
        found
    }

    #[cfg(windows)]
    fn search_paths() -> Vec<PathBuf> {
        Vec::new()
    }

    #[cfg(not(windows))]
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for dirname in ["encConverters", "fieldworks"] {
            for prefix in ["/usr/local", "/usr"] {
                for libname in ["libecdriver.so", "libecdriver_64.so"] {
                    paths.push(Path::new(prefix).join("lib").join(dirname).join(libname));
                }
            }
        }
        paths
    }
}

// ---------------------------------------------------------------------------
// Dynamic binder
// ---------------------------------------------------------------------------

/// Binds the real driver through the OS loader.
#[derive(Debug, Clone, Default)]
pub struct DynamicBinder {
    locator: ModuleLocator,
}

impl DynamicBinder {
    pub fn new(locator: ModuleLocator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &ModuleLocator {
        &self.locator
    }
}

impl LibraryBinder for DynamicBinder {
    fn bind(&mut self) -> Result<BoundLibrary, BindError> {
        let candidates = self.locator.candidates();
        let mut detail = String::from("no candidates");

        for path in &candidates {
            debug!(path = %path.display(), "loading EncConverters driver");
            // SAFETY: loading runs the module's initializers. ECDriver is
            // trusted the same way any installed system library is.
            match unsafe { Library::new(path) } {
                Ok(library) => {
                    let entry_points = resolve(&library);
                    let missing = entry_points.missing_required();
                    if missing.is_empty() {
                        info!(path = %path.display(), "EncConverters driver bound");
                    } else {
                        warn!(path = %path.display(), ?missing, "driver loaded with missing entry points");
                    }
                    return Ok(BoundLibrary {
                        entry_points,
                        path: Some(path.clone()),
                        library: Some(library),
                    });
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "driver load failed");
                    detail = e.to_string();
                }
            }
        }

        Err(BindError::ModuleNotFound {
            tried: candidates,
            detail,
        })
    }
}

fn resolve(library: &Library) -> EntryPoints {
    // SAFETY (all lookups): each type alias matches the prototype ECDriver
    // declares for that symbol.
    unsafe {
        EntryPoints {
            is_installed: lookup(library, symbols::IS_INSTALLED),
            select_converter: lookup(library, symbols::SELECT_CONVERTER),
            initialize_converter: lookup(library, symbols::INITIALIZE_CONVERTER),
            convert_string: lookup(library, symbols::CONVERT_STRING),
            describe_converter: lookup(library, symbols::DESCRIBE_CONVERTER),
            add_converter: lookup(library, symbols::ADD_CONVERTER),
            cleanup: lookup(library, symbols::CLEANUP),
        }
    }
}

/// Resolve `symbol` as a `T`.
///
/// # Safety
///
/// `T` must be the function-pointer type the module exports `symbol` as.
unsafe fn lookup<T: Copy>(library: &Library, symbol: &'static str) -> Option<T> {
    // SAFETY: upheld by the caller.
    match unsafe { library.get::<T>(symbol.as_bytes()) } {
        Ok(sym) => {
            trace!(symbol, "resolved entry point");
            Some(*sym)
        }
        Err(e) => {
            debug!(symbol, error = %e, "entry point not exported");
            None
        }
    }
}
