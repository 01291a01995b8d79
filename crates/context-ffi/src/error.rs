//! Error records and the panic-safe call guard.
//!
//! Every ABI function takes a trailing `ContextEH** eh`. On failure the
//! function allocates a record and stores it through `eh`; the caller owns
//! the record and frees it with [`ctx_error_destroy`]. When `eh` itself is
//! null the record is parked in a thread-local slot instead, where
//! [`ctx_error_take_last`] can pick it up. Nothing unwinds across the ABI.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use context_core::{ContextError, Result};

use crate::codes;

/// An error record: the failing function's code plus a message.
#[derive(Debug)]
pub struct ContextEH {
    code: u32,
    message: CString,
}

impl ContextEH {
    pub(crate) fn new(code: u32, message: impl Into<String>) -> Box<Self> {
        let safe: String = message
            .into()
            .chars()
            .map(|c| if c == '\0' { '?' } else { c })
            .collect();
        let message = CString::new(safe).unwrap_or_default();
        Box::new(Self { code, message })
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &CStr {
        &self.message
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<Box<ContextEH>>> = const { RefCell::new(None) };
}

/// Format a panic payload into an error message.
pub(crate) fn format_panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Hand a record to the caller, or park it when there is no slot.
pub(crate) fn report(record: Box<ContextEH>, eh: *mut *mut ContextEH) {
    let message = record.message.to_string_lossy().into_owned();
    if eh.is_null() {
        tracing::warn!(
            code = format_args!("{:#010x}", record.code),
            %message,
            "ABI call failed with no error slot"
        );
        LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(record));
    } else {
        tracing::debug!(code = format_args!("{:#010x}", record.code), %message, "ABI call failed");
        // SAFETY: a non-null `eh` points to writable storage for one record
        // pointer by the calling convention of every ABI function.
        unsafe { *eh = Box::into_raw(record) };
    }
}

/// Run `op`, converting errors and panics into a record tagged with `code`.
///
/// Returns `fallback` when `op` fails.
pub(crate) fn guard<T>(
    code: u32,
    eh: *mut *mut ContextEH,
    fallback: T,
    op: impl FnOnce() -> Result<T>,
) -> T {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            report(ContextEH::new(code, e.to_string()), eh);
            fallback
        }
        Err(payload) => {
            report(ContextEH::new(code, format_panic_payload(payload.as_ref())), eh);
            fallback
        }
    }
}

pub(crate) fn misuse(message: impl Into<String>) -> ContextError {
    ContextError::AbiMisuse(message.into())
}

/// Message of an error record, valid until the record is destroyed.
///
/// # Safety
///
/// `eh` must be null or a record produced by this library and not yet destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_error_message(eh: *const ContextEH) -> *const c_char {
    match unsafe { eh.as_ref() } {
        Some(record) => record.message.as_ptr(),
        None => {
            report(
                ContextEH::new(codes::ERROR_ACCESS, misuse("null error handle").to_string()),
                ptr::null_mut(),
            );
            ptr::null()
        }
    }
}

/// Code of an error record; 0 for a null record.
///
/// # Safety
///
/// `eh` must be null or a record produced by this library and not yet destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_error_code(eh: *const ContextEH) -> u32 {
    match unsafe { eh.as_ref() } {
        Some(record) => record.code,
        None => {
            report(
                ContextEH::new(codes::ERROR_ACCESS, misuse("null error handle").to_string()),
                ptr::null_mut(),
            );
            0
        }
    }
}

/// Free an error record. Null is ignored.
///
/// # Safety
///
/// `eh` must be null or a record produced by this library and not yet destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_error_destroy(eh: *mut ContextEH) {
    if !eh.is_null() {
        drop(unsafe { Box::from_raw(eh) });
    }
}

/// Take the record parked by the last call on this thread that had no error
/// slot, or null. The caller frees it with [`ctx_error_destroy`].
#[unsafe(no_mangle)]
pub extern "C" fn ctx_error_take_last() -> *mut ContextEH {
    LAST_ERROR
        .with(|slot| slot.borrow_mut().take())
        .map_or(ptr::null_mut(), Box::into_raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_bytes_are_replaced() {
        let record = ContextEH::new(7, "a\0b");
        assert_eq!(record.message().to_str().unwrap(), "a?b");
        assert_eq!(record.code(), 7);
    }

    #[test]
    fn panic_payloads_are_formatted() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(format_panic_payload(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(format_panic_payload(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(format_panic_payload(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn guard_returns_value_and_leaves_slot_untouched() {
        let mut eh: *mut ContextEH = ptr::null_mut();
        let out = guard(1, &mut eh, 0, || Ok(5));
        assert_eq!(out, 5);
        assert!(eh.is_null());
    }

    #[test]
    fn guard_converts_panics() {
        let mut eh: *mut ContextEH = ptr::null_mut();
        let out = guard(42, &mut eh, -1, || panic!("exploded"));
        assert_eq!(out, -1);
        let record = unsafe { Box::from_raw(eh) };
        assert_eq!(record.code(), 42);
        assert_eq!(record.message().to_str().unwrap(), "exploded");
    }

    #[test]
    fn null_slot_parks_the_record() {
        let _ = ctx_error_take_last();
        let out = guard(9, ptr::null_mut(), false, || Err(misuse("nope")));
        assert!(!out);
        let parked = ctx_error_take_last();
        assert!(!parked.is_null());
        assert_eq!(unsafe { ctx_error_code(parked) }, 9);
        unsafe { ctx_error_destroy(parked) };
        assert!(ctx_error_take_last().is_null());
    }
}
