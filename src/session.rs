//! Converter session: binding, selection, initialization, conversion.
//!
//! A session moves `Unbound → Bound(no converter) → Bound(active)`. The
//! driver is bound lazily on first use and at most once; the bound module
//! is owned by the session and unloaded when the session is dropped.
//!
//! Two APIs sit on the same state:
//!
//! - `try_*` methods return [`EcError`] so callers can act on the reason.
//! - [`pick_converter`](ConverterSession::pick_converter),
//!   [`set_converter`](ConverterSession::set_converter) and
//!   [`convert`](ConverterSession::convert) never fail: they log, keep the
//!   error in [`last_error`](ConverterSession::last_error), and return
//!   `false` or an empty string.
//!
//! Every method that calls into the driver takes `&mut self`. The driver
//! is not reentrant, and the exclusive borrow is what keeps two threads
//! from calling it at once.

use tracing::{debug, info, warn};

use crate::binder::{BoundLibrary, DynamicBinder, LibraryBinder};
use crate::config::{Config, MAX_OUTPUT_CAPACITY};
use crate::engine::{Engine, NewConverter};
use crate::error::EcError;
use crate::settings::ConverterSettings;
use crate::text::DEFAULT_OUTPUT_CAPACITY;

pub struct ConverterSession<B: LibraryBinder = DynamicBinder> {
    binder: B,
    bound: Option<BoundLibrary>,
    active: Option<ConverterSettings>,
    last_attempt: Option<ConverterSettings>,
    last_error: Option<EcError>,
    output_capacity: usize,
}

impl ConverterSession<DynamicBinder> {
    /// A session over the real driver, located per `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(DynamicBinder::new(config.locator())).with_output_capacity(config.output_capacity)
    }
}

impl<B: LibraryBinder> ConverterSession<B> {
    pub fn new(binder: B) -> Self {
        Self {
            binder,
            bound: None,
            active: None,
            last_attempt: None,
            last_error: None,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }

    /// Output buffer capacity, in code units, for [`try_convert`](Self::try_convert).
    pub fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity.clamp(1, MAX_OUTPUT_CAPACITY);
        self
    }

    pub fn output_capacity(&self) -> usize {
        self.output_capacity
    }

    pub fn binder(&self) -> &B {
        &self.binder
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Bind the driver if this session has not done so yet.
    ///
    /// A module that loaded is cached even if some entry points are
    /// missing, so later calls never reload it. A module that failed to
    /// load is not cached; the next call tries again.
    pub fn ensure_bound(&mut self) -> Result<&BoundLibrary, EcError> {
        let bound = Self::bind_once(&mut self.binder, &mut self.bound)?;
        Ok(bound)
    }

    /// True once the driver loaded with every required entry point.
    ///
    /// A module that loaded with missing symbols is kept (see
    /// [`bound_library`](Self::bound_library)) but does not count as bound.
    pub fn is_bound(&self) -> bool {
        self.bound.as_ref().is_some_and(BoundLibrary::all_resolved)
    }

    pub fn bound_library(&self) -> Option<&BoundLibrary> {
        self.bound.as_ref()
    }

    fn bind_once<'a>(
        binder: &mut B,
        slot: &'a mut Option<BoundLibrary>,
    ) -> Result<&'a BoundLibrary, EcError> {
        let bound = match slot.take() {
            Some(bound) => bound,
            None => {
                debug!("binding EncConverters driver");
                binder.bind()?
            }
        };
        Ok(slot.insert(bound))
    }

    /// Bind, require every entry point, and require `IsEcInstalled`.
    fn installed_engine<'a>(
        binder: &mut B,
        slot: &'a mut Option<BoundLibrary>,
    ) -> Result<Engine<'a>, EcError> {
        let bound = Self::bind_once(binder, slot)?;
        let engine = bound.engine().map_err(|e| EcError::EngineUnavailable {
            reason: e.to_string(),
        })?;
        if !engine.is_installed() {
            return Err(EcError::EngineNotInstalled);
        }
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Typed operations
    // -----------------------------------------------------------------------

    /// Let the user pick a converter. Blocks while the picker is open.
    ///
    /// On success the picked settings become active. On cancel or failure
    /// the session is left exactly as it was.
    pub fn try_pick_converter(&mut self) -> Result<ConverterSettings, EcError> {
        let engine = Self::installed_engine(&mut self.binder, &mut self.bound)?;
        let picked = engine.select_converter()?;
        info!(%picked, "converter picked");
        self.active = Some(picked.clone());
        Ok(picked)
    }

    /// Activate a converter without user interaction.
    ///
    /// The candidate is recorded before the driver confirms it. If the
    /// driver rejects it, no converter is active afterwards, including any
    /// converter that was active before; the rejected candidate stays
    /// available through [`last_attempt`](Self::last_attempt).
    pub fn try_set_converter(&mut self, settings: ConverterSettings) -> Result<(), EcError> {
        let engine = Self::installed_engine(&mut self.binder, &mut self.bound)?;
        if settings.name.is_empty() {
            return Err(EcError::NoConverterSpecified);
        }

        self.last_attempt = Some(settings.clone());
        self.active = Some(settings.clone());
        match engine.initialize_converter(&settings) {
            Ok(()) => {
                info!(%settings, "converter initialized");
                Ok(())
            }
            Err(e) => {
                self.active = None;
                Err(e)
            }
        }
    }

    /// Convert `input` with the active converter.
    pub fn try_convert(&mut self, input: &str) -> Result<String, EcError> {
        let Some(active) = self.active.as_ref() else {
            return Err(EcError::NoActiveConverter);
        };
        let bound = Self::bind_once(&mut self.binder, &mut self.bound)?;
        let engine = bound.engine().map_err(|e| EcError::EngineUnavailable {
            reason: e.to_string(),
        })?;
        debug!(converter = active.name, "converting");
        engine.convert_string(&active.name, input, self.output_capacity)
    }

    /// The repository's description of converter `name`.
    pub fn describe_converter(&mut self, name: &str) -> Result<String, EcError> {
        if name.is_empty() {
            return Err(EcError::NoConverterSpecified);
        }
        let engine = Self::installed_engine(&mut self.binder, &mut self.bound)?;
        engine.describe_converter(name, self.output_capacity)
    }

    /// Register a new converter in the repository.
    pub fn add_converter(&mut self, new: &NewConverter) -> Result<(), EcError> {
        let engine = Self::installed_engine(&mut self.binder, &mut self.bound)?;
        engine.add_converter(new)?;
        info!(name = new.name, "converter added");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Host surface
    // -----------------------------------------------------------------------

    /// Like [`try_pick_converter`](Self::try_pick_converter), reporting only
    /// whether a converter was picked.
    pub fn pick_converter(&mut self) -> bool {
        let result = self.try_pick_converter();
        self.record("pick converter", result).is_some()
    }

    /// Like [`try_set_converter`](Self::try_set_converter), reporting only
    /// whether the converter is now active.
    pub fn set_converter(&mut self, name: &str, forward: bool, norm_form: i32) -> bool {
        let result = self.try_set_converter(ConverterSettings::new(name, forward, norm_form));
        self.record("set converter", result).is_some()
    }

    /// Like [`try_convert`](Self::try_convert), returning `""` on failure.
    pub fn convert(&mut self, input: &str) -> String {
        let result = self.try_convert(input);
        self.record("convert", result).unwrap_or_default()
    }

    /// Name of the active converter, or `""`.
    pub fn name(&self) -> &str {
        self.active.as_ref().map_or("", |s| s.name.as_str())
    }

    /// Direction of the active converter; `true` when none is active.
    pub fn direction(&self) -> bool {
        self.active.as_ref().is_none_or(|s| s.forward)
    }

    /// Normalization form of the active converter; `0` when none is active.
    pub fn normalization_form(&self) -> i32 {
        self.active.as_ref().map_or(0, |s| s.norm_form)
    }

    pub fn active(&self) -> Option<&ConverterSettings> {
        self.active.as_ref()
    }

    /// Settings most recently passed to a set operation, successful or not.
    pub fn last_attempt(&self) -> Option<&ConverterSettings> {
        self.last_attempt.as_ref()
    }

    /// Why the last host-surface call failed, if it did.
    pub fn last_error(&self) -> Option<&EcError> {
        self.last_error.as_ref()
    }

    fn record<T>(&mut self, operation: &'static str, result: Result<T, EcError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(e) => {
                if e.is_benign() {
                    debug!(operation, error = %e, "no converter change");
                } else {
                    warn!(operation, kind = e.kind(), error = %e, "EncConverters call failed");
                }
                self.last_error = Some(e);
                None
            }
        }
    }
}

impl<B: LibraryBinder> std::fmt::Debug for ConverterSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterSession")
            .field("bound", &self.bound)
            .field("active", &self.active)
            .field("last_error", &self.last_error)
            .field("output_capacity", &self.output_capacity)
            .finish()
    }
}
