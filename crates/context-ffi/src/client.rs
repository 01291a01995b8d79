//! Safe Rust client over the C functions.
//!
//! [`ContextHandle`] owns a tree and destroys it on drop. [`ContextRef`] is
//! a weak reference to a node inside some tree, borrowed from the handle or
//! reference it was looked up through. Both implement [`ContextApi`], whose
//! methods call the exported functions and turn error records into
//! [`AbiError`]s.

use std::ffi::{c_char, CStr, CString};
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::context::{self as abi, HContext};
use crate::error::{ctx_error_destroy, ContextEH};

/// An error record copied out of the library.
///
/// Code 0 marks arguments rejected on the Rust side before any call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code:#010x})")]
pub struct AbiError {
    pub code: u32,
    pub message: String,
}

/// Call `f` with a fresh error slot, consuming any record it leaves there.
fn call<T>(f: impl FnOnce(*mut *mut ContextEH) -> T) -> Result<T, AbiError> {
    let mut eh: *mut ContextEH = ptr::null_mut();
    let out = f(&mut eh);
    match NonNull::new(eh) {
        None => Ok(out),
        Some(record) => {
            let record = record.as_ptr();
            // SAFETY: a non-null slot holds a record the call just allocated.
            let err = unsafe {
                AbiError {
                    code: (*record).code(),
                    message: (*record).message().to_string_lossy().into_owned(),
                }
            };
            unsafe { ctx_error_destroy(record) };
            Err(err)
        }
    }
}

fn c_string(s: &str) -> Result<CString, AbiError> {
    CString::new(s).map_err(|_| AbiError {
        code: 0,
        message: format!("string contains a NUL byte: {s:?}"),
    })
}

fn owned(raw: *mut HContext) -> Result<ContextHandle, AbiError> {
    if raw.is_null() {
        return Err(null_handle());
    }
    Ok(ContextHandle { raw })
}

fn null_handle() -> AbiError {
    AbiError {
        code: 0,
        message: "null handle".to_string(),
    }
}

fn weak<'a>(raw: *mut HContext) -> Result<ContextRef<'a>, AbiError> {
    NonNull::new(raw)
        .map(|raw| ContextRef {
            raw,
            _marker: PhantomData,
        })
        .ok_or_else(null_handle)
}

/// Operations shared by owning handles and weak references.
pub trait ContextApi {
    /// The underlying node handle.
    fn raw(&self) -> *mut HContext;

    /// Child under `key`, inserted as `None` if missing.
    fn entry(&mut self, key: &str) -> Result<ContextRef<'_>, AbiError> {
        let key = c_string(key)?;
        let raw = call(|eh| unsafe { abi::ctx_get_or_insert_by_key(self.raw(), key.as_ptr(), eh) })?;
        weak(raw)
    }

    /// Existing child under `key`.
    fn get(&mut self, key: &str) -> Result<ContextRef<'_>, AbiError> {
        let key = c_string(key)?;
        let raw = call(|eh| unsafe { abi::ctx_get_by_key(self.raw(), key.as_ptr(), eh) })?;
        weak(raw)
    }

    /// Array element; negative indices count from the back.
    fn index(&mut self, index: i64) -> Result<ContextRef<'_>, AbiError> {
        let raw = call(|eh| unsafe { abi::ctx_get_by_index(self.raw(), index, eh) })?;
        weak(raw)
    }

    fn contains(&self, key: &str) -> Result<bool, AbiError> {
        let key = c_string(key)?;
        call(|eh| unsafe { abi::ctx_contains(self.raw(), key.as_ptr(), eh) })
    }

    fn erase(&mut self, key: &str) -> Result<usize, AbiError> {
        let key = c_string(key)?;
        call(|eh| unsafe { abi::ctx_erase_key(self.raw(), key.as_ptr(), eh) })
    }

    fn put_str(&mut self, value: &str) -> Result<(), AbiError> {
        let value = c_string(value)?;
        call(|eh| unsafe { abi::ctx_put_str(self.raw(), value.as_ptr(), eh) })
    }

    fn put_long(&mut self, value: i64) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_put_long(self.raw(), value, eh) })
    }

    fn put_unsigned_long(&mut self, value: u64) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_put_unsigned_long(self.raw(), value, eh) })
    }

    fn put_double(&mut self, value: f64) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_put_double(self.raw(), value, eh) })
    }

    fn put_bool(&mut self, value: bool) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_put_bool(self.raw(), value, eh) })
    }

    /// Store a copy of `bytes`. Empty slices are rejected by the library.
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), AbiError> {
        call(|eh| unsafe {
            abi::ctx_put_const_data_ptr(self.raw(), bytes.as_ptr(), bytes.len(), eh)
        })
        .map(|_| ())
    }

    /// Store a zeroed buffer of `size` bytes and return its address.
    fn alloc_data(&mut self, size: usize) -> Result<*mut u8, AbiError> {
        call(|eh| unsafe { abi::ctx_alloc_data_ptr(self.raw(), size, eh) })
    }

    fn get_str(&self) -> Result<String, AbiError> {
        let size = call(|eh| unsafe { abi::ctx_get_str_size(self.raw(), eh) })?;
        let mut buf = vec![0u8; size];
        call(|eh| unsafe { abi::ctx_get_str(self.raw(), buf.as_mut_ptr().cast::<c_char>(), eh) })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn get_long(&self) -> Result<i64, AbiError> {
        call(|eh| unsafe { abi::ctx_get_long(self.raw(), eh) })
    }

    fn get_unsigned_long(&self) -> Result<u64, AbiError> {
        call(|eh| unsafe { abi::ctx_get_unsigned_long(self.raw(), eh) })
    }

    fn get_double(&self) -> Result<f64, AbiError> {
        call(|eh| unsafe { abi::ctx_get_double(self.raw(), eh) })
    }

    fn get_bool(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_get_bool(self.raw(), eh) })
    }

    /// Copy of the bytes held by a buffer scalar.
    fn get_bytes(&self) -> Result<Vec<u8>, AbiError> {
        let data = call(|eh| unsafe { abi::ctx_get_data_ptr(self.raw(), eh) })?;
        let size = call(|eh| unsafe { abi::ctx_get_data_size(self.raw(), eh) })?;
        if size == 0 {
            return Ok(Vec::new());
        }
        // SAFETY: the node owns `size` readable bytes at `data`.
        Ok(unsafe { std::slice::from_raw_parts(data, size) }.to_vec())
    }

    fn len(&self) -> Result<usize, AbiError> {
        call(|eh| unsafe { abi::ctx_get_length(self.raw(), eh) })
    }

    fn keys(&self) -> Result<Vec<String>, AbiError> {
        let len = self.len()?;
        let raw = call(|eh| unsafe { abi::ctx_get_keys(self.raw(), len, eh) })?;
        if raw.is_null() {
            return Ok(Vec::new());
        }
        let keys = (0..len)
            .map(|i| unsafe { CStr::from_ptr(*raw.add(i)) }.to_string_lossy().into_owned())
            .collect();
        unsafe { abi::ctx_free_keys(raw, len) };
        Ok(keys)
    }

    fn is_empty(&self) -> Result<bool, AbiError> {
        self.len().map(|n| n == 0)
    }

    fn is_none(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_none(self.raw(), eh) })
    }

    fn is_array(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_array(self.raw(), eh) })
    }

    fn is_object(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_object(self.raw(), eh) })
    }

    fn is_bool(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_bool(self.raw(), eh) })
    }

    fn is_long(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_long(self.raw(), eh) })
    }

    fn is_unsigned_long(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_unsigned_long(self.raw(), eh) })
    }

    fn is_double(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_double(self.raw(), eh) })
    }

    fn is_string(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_string(self.raw(), eh) })
    }

    fn is_data(&self) -> Result<bool, AbiError> {
        call(|eh| unsafe { abi::ctx_is_data_ptr(self.raw(), eh) })
    }

    /// Append a deep copy of `other`.
    fn push_back_copy(&mut self, other: &impl ContextApi) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_push_back(self.raw(), other.raw(), true, eh) })
    }

    /// Append the content of `other`, leaving it `None`.
    fn push_back_move(&mut self, other: &mut impl ContextApi) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_push_back(self.raw(), other.raw(), false, eh) })
    }

    fn clear(&mut self) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_clear(self.raw(), eh) })
    }

    /// Deep copy into a new owning handle.
    fn to_handle(&self) -> Result<ContextHandle, AbiError> {
        let raw = call(|eh| unsafe { abi::ctx_clone(self.raw(), eh) })?;
        owned(raw)
    }

    /// JSON text; `indent < 0` is compact.
    fn to_json(&self, indent: i32) -> Result<String, AbiError> {
        self.to_json_with(indent, b' ', false)
    }

    fn to_json_with(&self, indent: i32, indent_char: u8, ensure_ascii: bool) -> Result<String, AbiError> {
        let raw = call(|eh| unsafe {
            abi::ctx_serialize(self.raw(), indent, indent_char as c_char, ensure_ascii, eh)
        })?;
        if raw.is_null() {
            return Ok(String::new());
        }
        let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { abi::ctx_free_str(raw) };
        Ok(text)
    }
}

/// Owning handle; the tree is destroyed on drop or by [`destroy`].
///
/// A destroyed handle holds null, so later calls fail with an [`AbiError`]
/// instead of touching freed memory.
///
/// [`destroy`]: ContextHandle::destroy
#[derive(Debug)]
pub struct ContextHandle {
    raw: *mut HContext,
}

// SAFETY: the handle exclusively owns its tree and Context is Send.
unsafe impl Send for ContextHandle {}

impl ContextHandle {
    pub fn new() -> Result<Self, AbiError> {
        owned(call(|eh| abi::ctx_create(eh))?)
    }

    pub fn from_json(text: &str) -> Result<Self, AbiError> {
        let text = c_string(text)?;
        owned(call(|eh| unsafe { abi::ctx_deserialize(text.as_ptr(), eh) })?)
    }

    /// Take ownership of a handle produced by `ctx_create`, `ctx_clone` or
    /// `ctx_deserialize`.
    ///
    /// # Safety
    ///
    /// `raw` must be such a handle, not owned by anything else.
    pub unsafe fn from_raw(raw: *mut HContext) -> Option<Self> {
        (!raw.is_null()).then_some(Self { raw })
    }

    /// Give up ownership; the caller must `ctx_destroy` the result.
    pub fn into_raw(mut self) -> *mut HContext {
        std::mem::replace(&mut self.raw, ptr::null_mut())
    }

    /// Destroy the tree now, leaving a null handle behind.
    pub fn destroy(&mut self) -> Result<(), AbiError> {
        let raw = std::mem::replace(&mut self.raw, ptr::null_mut());
        if raw.is_null() {
            return Ok(());
        }
        call(|eh| unsafe { abi::ctx_destroy(raw, eh) })
    }

    pub fn is_destroyed(&self) -> bool {
        self.raw.is_null()
    }

    /// Weak reference to the root node.
    pub fn root(&mut self) -> Result<ContextRef<'_>, AbiError> {
        weak(self.raw)
    }

    /// Replace this handle with a deep copy of `other`.
    pub fn assign(&mut self, other: &impl ContextApi) -> Result<(), AbiError> {
        let mut copy = other.to_handle()?;
        std::mem::swap(self, &mut copy);
        Ok(())
    }
}

impl ContextApi for ContextHandle {
    fn raw(&self) -> *mut HContext {
        self.raw
    }
}

impl Drop for ContextHandle {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::warn!(error = %e, "failed to destroy context handle");
        }
    }
}

/// Weak reference to a node owned elsewhere.
#[derive(Debug)]
pub struct ContextRef<'a> {
    raw: NonNull<HContext>,
    _marker: PhantomData<&'a mut HContext>,
}

impl ContextRef<'_> {
    /// Wrap a node handle without taking ownership.
    ///
    /// # Safety
    ///
    /// `raw` must stay live for the chosen lifetime.
    pub unsafe fn from_raw<'a>(raw: *mut HContext) -> Option<ContextRef<'a>> {
        NonNull::new(raw).map(|raw| ContextRef {
            raw,
            _marker: PhantomData,
        })
    }

    /// Overwrite the referenced node with a deep copy of `other`.
    pub fn assign(&mut self, other: &impl ContextApi) -> Result<(), AbiError> {
        call(|eh| unsafe { abi::ctx_copy(other.raw(), self.raw.as_ptr(), eh) })
    }

    pub fn reborrow(&mut self) -> ContextRef<'_> {
        ContextRef {
            raw: self.raw,
            _marker: PhantomData,
        }
    }
}

impl ContextApi for ContextRef<'_> {
    fn raw(&self) -> *mut HContext {
        self.raw.as_ptr()
    }
}
