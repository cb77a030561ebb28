//! In-process stand-in for the ECDriver entry points.
//!
//! The functions below have the driver's exact C signatures and read their
//! behaviour from thread-local state, so each test (which runs on its own
//! thread) configures an independent fake driver.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use ecconv::binder::{Bool, EntryPoints};
use ecconv::status::ErrStatus;
use ecconv::text::{EcChar, NAME_CAPACITY, from_engine, to_engine};
use ecconv::{BindError, BoundLibrary, LibraryBinder};

#[derive(Debug, Clone)]
pub enum SelectOutcome {
    Picked {
        name: &'static str,
        forward: bool,
        norm_form: i32,
    },
    Status(i32),
}

#[derive(Debug, Clone, Copy)]
pub enum ConvertMode {
    /// Copy input to output, truncating and terminating like the driver.
    Identity,
    /// Always write this text.
    Fixed(&'static str),
    /// Write nothing and return this status.
    Status(i32),
}

thread_local! {
    static INSTALLED: Cell<bool> = const { Cell::new(true) };
    static SELECT: RefCell<SelectOutcome> = const { RefCell::new(SelectOutcome::Status(-1)) };
    static INIT_STATUS: Cell<i32> = const { Cell::new(0) };
    static CONVERT: Cell<ConvertMode> = const { Cell::new(ConvertMode::Identity) };
    static INIT_CALLS: RefCell<Vec<(String, bool, i32)>> = const { RefCell::new(Vec::new()) };
    static CONVERT_CALLS: RefCell<Vec<(String, String)>> = const { RefCell::new(Vec::new()) };
    static ADDED: RefCell<Vec<(String, String, u16, u16)>> = const { RefCell::new(Vec::new()) };
    static CLEANUPS: Cell<usize> = const { Cell::new(0) };
}

pub fn set_installed(installed: bool) {
    INSTALLED.with(|c| c.set(installed));
}

pub fn set_select(outcome: SelectOutcome) {
    SELECT.with(|c| *c.borrow_mut() = outcome);
}

pub fn set_init_status(status: ErrStatus) {
    INIT_STATUS.with(|c| c.set(status.code()));
}

pub fn set_convert(mode: ConvertMode) {
    CONVERT.with(|c| c.set(mode));
}

pub fn init_calls() -> Vec<(String, bool, i32)> {
    INIT_CALLS.with(|c| c.borrow().clone())
}

pub fn convert_calls() -> Vec<(String, String)> {
    CONVERT_CALLS.with(|c| c.borrow().clone())
}

pub fn added() -> Vec<(String, String, u16, u16)> {
    ADDED.with(|c| c.borrow().clone())
}

pub fn cleanups() -> usize {
    CLEANUPS.with(Cell::get)
}

/// # Safety
/// `ptr` must point at a NUL-terminated string.
unsafe fn read_c(ptr: *const EcChar) -> String {
    let mut len = 0;
    // SAFETY: the caller guarantees a terminator.
    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }
    // SAFETY: `len` units before the terminator are initialized.
    from_engine(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Write `s` into `dst`, cutting it to `cap - 1` units and always
/// terminating, the way the driver fills a bounded buffer.
///
/// # Safety
/// `dst` must be valid for `cap` writes.
unsafe fn write_c(dst: *mut EcChar, cap: usize, s: &str) {
    if cap == 0 {
        return;
    }
    let units = to_engine("mock output", s).expect("mock text has no NUL");
    let n = (units.len() - 1).min(cap - 1);
    // SAFETY: `n + 1 <= cap`.
    unsafe {
        std::ptr::copy_nonoverlapping(units.as_ptr(), dst, n);
        *dst.add(n) = 0;
    }
}

pub unsafe extern "system" fn is_installed() -> Bool {
    Bool::from(INSTALLED.with(Cell::get))
}

pub unsafe extern "system" fn select_converter(
    name: *mut EcChar,
    forward: *mut Bool,
    norm_form: *mut i32,
) -> i32 {
    match SELECT.with(|c| c.borrow().clone()) {
        SelectOutcome::Picked {
            name: picked,
            forward: fw,
            norm_form: nf,
        } => {
            // SAFETY: the session passes a NAME_CAPACITY-unit buffer and live out-params.
            unsafe {
                write_c(name, NAME_CAPACITY, picked);
                *forward = Bool::from(fw);
                *norm_form = nf;
            }
            0
        }
        SelectOutcome::Status(status) => status,
    }
}

pub unsafe extern "system" fn initialize_converter(
    name: *const EcChar,
    forward: Bool,
    norm_form: i32,
) -> i32 {
    // SAFETY: the session passes a NUL-terminated name.
    let name = unsafe { read_c(name) };
    INIT_CALLS.with(|c| c.borrow_mut().push((name, forward != 0, norm_form)));
    INIT_STATUS.with(Cell::get)
}

pub unsafe extern "system" fn convert_string(
    name: *const EcChar,
    input: *const EcChar,
    output: *mut EcChar,
    output_len: i32,
) -> i32 {
    // SAFETY: the session passes NUL-terminated strings.
    let (name, input) = unsafe { (read_c(name), read_c(input)) };
    CONVERT_CALLS.with(|c| c.borrow_mut().push((name, input.clone())));
    let cap = usize::try_from(output_len).unwrap_or(0);
    match CONVERT.with(Cell::get) {
        // SAFETY: the session reports the true buffer length.
        ConvertMode::Identity => unsafe { write_c(output, cap, &input) },
        ConvertMode::Fixed(text) => unsafe { write_c(output, cap, text) },
        ConvertMode::Status(status) => return status,
    }
    0
}

pub unsafe extern "system" fn describe_converter(
    name: *const EcChar,
    description: *mut EcChar,
    len: i32,
) -> i32 {
    // SAFETY: NUL-terminated name; `len` is the buffer length.
    unsafe {
        let name = read_c(name);
        if name != "Converter1" {
            return ErrStatus::NAME_NOT_FOUND.code();
        }
        write_c(
            description,
            usize::try_from(len).unwrap_or(0),
            "Converter1: TECkit legacy to Unicode",
        );
    }
    0
}

pub unsafe extern "system" fn add_converter(
    name: *const EcChar,
    spec: *const EcChar,
    conv_type: u16,
    _left: *const EcChar,
    _right: *const EcChar,
    process_type: u16,
) -> i32 {
    // SAFETY: all strings are NUL-terminated.
    let (name, spec) = unsafe { (read_c(name), read_c(spec)) };
    ADDED.with(|c| c.borrow_mut().push((name, spec, conv_type, process_type)));
    0
}

pub unsafe extern "system" fn cleanup() {
    CLEANUPS.with(|c| c.set(c.get() + 1));
}

/// All four required entry points plus cleanup.
pub fn required_table() -> EntryPoints {
    EntryPoints {
        is_installed: Some(is_installed),
        select_converter: Some(select_converter),
        initialize_converter: Some(initialize_converter),
        convert_string: Some(convert_string),
        cleanup: Some(cleanup),
        ..Default::default()
    }
}

/// Every entry point, optional ones included.
pub fn full_table() -> EntryPoints {
    EntryPoints {
        describe_converter: Some(describe_converter),
        add_converter: Some(add_converter),
        ..required_table()
    }
}

/// A binder that counts how often it is asked to load.
pub struct MockBinder {
    pub table: Option<EntryPoints>,
    pub loads: usize,
}

impl MockBinder {
    pub fn with(table: EntryPoints) -> Self {
        Self {
            table: Some(table),
            loads: 0,
        }
    }

    /// Behaves like a machine without EncConverters.
    pub fn absent() -> Self {
        Self {
            table: None,
            loads: 0,
        }
    }
}

impl LibraryBinder for MockBinder {
    fn bind(&mut self) -> Result<BoundLibrary, BindError> {
        self.loads += 1;
        match self.table {
            Some(table) => Ok(BoundLibrary::from_entry_points(table)),
            None => Err(BindError::ModuleNotFound {
                tried: vec![PathBuf::from("ECDriver.dll")],
                detail: "The specified module could not be found.".to_string(),
            }),
        }
    }
}
