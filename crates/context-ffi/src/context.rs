//! C functions over Context handles.
//!
//! Handles returned by `ctx_create`, `ctx_clone` and `ctx_deserialize` own a
//! tree and must be released with `ctx_destroy`. Handles returned by the
//! lookup functions alias a node inside their parent's tree: they are never
//! destroyed and become dangling once the parent is destroyed or the node is
//! removed or replaced.

use std::ffi::{c_char, CStr, CString};
use std::{ptr, slice};

use context_core::{Context, Result, SerializeOptions, SharedBuffer};

use crate::codes;
use crate::error::{guard, misuse, report, ContextEH};

/// Longest string accepted by `ctx_put_str` and used as a key, in bytes.
pub const MAX_STR_SIZE: usize = 65535;

/// Opaque handle to a Context node.
#[repr(transparent)]
pub struct HContext(Context);

impl HContext {
    pub fn as_context(&self) -> &Context {
        &self.0
    }

    pub fn as_context_mut(&mut self) -> &mut Context {
        &mut self.0
    }
}

fn owned_handle(ctx: Context) -> *mut HContext {
    Box::into_raw(Box::new(HContext(ctx)))
}

fn child_handle(ctx: &mut Context) -> *mut HContext {
    (ctx as *mut Context).cast::<HContext>()
}

unsafe fn context<'a>(ptr: *const HContext) -> Result<&'a Context> {
    unsafe { ptr.as_ref() }
        .map(|h| &h.0)
        .ok_or_else(|| misuse("null context handle"))
}

unsafe fn context_mut<'a>(ptr: *mut HContext) -> Result<&'a mut Context> {
    unsafe { ptr.as_mut() }
        .map(|h| &mut h.0)
        .ok_or_else(|| misuse("null context handle"))
}

/// Read a NUL-terminated UTF-8 string of at most `limit` bytes.
unsafe fn bounded_str<'a>(ptr: *const c_char, limit: usize) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(misuse("null string"));
    }
    let mut len = 0;
    // SAFETY: the caller guarantees a NUL-terminated string; the scan stops
    // at the terminator or one byte past the limit, whichever comes first.
    while unsafe { *ptr.add(len) } != 0 {
        if len == limit {
            return Err(misuse(format!("string exceeds {limit} bytes")));
        }
        len += 1;
    }
    let bytes = unsafe { slice::from_raw_parts(ptr.cast::<u8>(), len) };
    std::str::from_utf8(bytes).map_err(|e| misuse(format!("string is not valid UTF-8: {e}")))
}

unsafe fn unbounded_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(misuse("null string"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| misuse(format!("string is not valid UTF-8: {e}")))
}

fn into_c_string(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| misuse("string contains a NUL byte"))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create an owning handle to a new `None` node.
#[unsafe(no_mangle)]
pub extern "C" fn ctx_create(eh: *mut *mut ContextEH) -> *mut HContext {
    guard(codes::CREATE, eh, ptr::null_mut(), || Ok(owned_handle(Context::new())))
}

/// Destroy an owning handle. Null is ignored.
///
/// # Safety
///
/// `ctx` must be null or an owning handle that has not been destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_destroy(ctx: *mut HContext, eh: *mut *mut ContextEH) {
    guard(codes::DESTROY, eh, (), || {
        if !ctx.is_null() {
            drop(unsafe { Box::from_raw(ctx) });
        }
        Ok(())
    })
}

/// Deep-copy a node into a new owning handle.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_clone(ctx: *const HContext, eh: *mut *mut ContextEH) -> *mut HContext {
    guard(codes::CLONE, eh, ptr::null_mut(), || {
        Ok(owned_handle(unsafe { context(ctx) }?.clone()))
    })
}

/// Replace `dst`'s content with a deep copy of `src`.
///
/// # Safety
///
/// Both handles must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_copy(
    src: *const HContext,
    dst: *mut HContext,
    eh: *mut *mut ContextEH,
) {
    guard(codes::COPY, eh, (), || {
        let value = unsafe { context(src) }?.clone();
        unsafe { context_mut(dst) }?.set(value);
        Ok(())
    })
}

/// Reset a node to `None`.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_clear(ctx: *mut HContext, eh: *mut *mut ContextEH) {
    guard(codes::CLEAR, eh, (), || {
        unsafe { context_mut(ctx) }?.clear();
        Ok(())
    })
}

// ============================================================================
// Navigation
// ============================================================================

/// Child under `key`, inserted as `None` if missing. A `None` node becomes
/// an object first.
///
/// # Safety
///
/// `ctx` must be a live handle and `key` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_or_insert_by_key(
    ctx: *mut HContext,
    key: *const c_char,
    eh: *mut *mut ContextEH,
) -> *mut HContext {
    guard(codes::GET_OR_INSERT_BY_KEY, eh, ptr::null_mut(), || {
        let key = unsafe { bounded_str(key, MAX_STR_SIZE) }?;
        unsafe { context_mut(ctx) }?.item(key).map(child_handle)
    })
}

/// Existing child under `key`.
///
/// # Safety
///
/// `ctx` must be a live handle and `key` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_by_key(
    ctx: *mut HContext,
    key: *const c_char,
    eh: *mut *mut ContextEH,
) -> *mut HContext {
    guard(codes::GET_BY_KEY, eh, ptr::null_mut(), || {
        let key = unsafe { bounded_str(key, MAX_STR_SIZE) }?;
        unsafe { context_mut(ctx) }?.at_mut(key).map(child_handle)
    })
}

/// Array element at `index`; negative indices count from the back. Index 0
/// on a None node turns it into a one-element array.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_by_index(
    ctx: *mut HContext,
    index: i64,
    eh: *mut *mut ContextEH,
) -> *mut HContext {
    guard(codes::GET_BY_INDEX, eh, ptr::null_mut(), || {
        unsafe { context_mut(ctx) }?.item(index).map(child_handle)
    })
}

/// # Safety
///
/// `ctx` must be a live handle and `key` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_contains(
    ctx: *const HContext,
    key: *const c_char,
    eh: *mut *mut ContextEH,
) -> bool {
    guard(codes::CONTAINS, eh, false, || {
        let key = unsafe { bounded_str(key, MAX_STR_SIZE) }?;
        unsafe { context(ctx) }?.contains(key)
    })
}

/// Remove an object member; returns the number removed. Handles into the
/// removed subtree dangle afterwards.
///
/// # Safety
///
/// `ctx` must be a live handle and `key` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_erase_key(
    ctx: *mut HContext,
    key: *const c_char,
    eh: *mut *mut ContextEH,
) -> usize {
    guard(codes::ERASE_KEY, eh, 0, || {
        let key = unsafe { bounded_str(key, MAX_STR_SIZE) }?;
        unsafe { context_mut(ctx) }?.erase(key)
    })
}

// ============================================================================
// Putters
// ============================================================================

/// Store a UTF-8 string of at most [`MAX_STR_SIZE`] bytes.
///
/// # Safety
///
/// `ctx` must be a live handle and `s` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_put_str(ctx: *mut HContext, s: *const c_char, eh: *mut *mut ContextEH) {
    guard(codes::PUT_STR, eh, (), || {
        let s = unsafe { bounded_str(s, MAX_STR_SIZE) }?;
        unsafe { context_mut(ctx) }?.set(s);
        Ok(())
    })
}

macro_rules! scalar_putter {
    ($($name:ident($ty:ty) => $code:path;)*) => {
        $(
            #[doc = concat!("Store a `", stringify!($ty), "` scalar.")]
            ///
            /// # Safety
            ///
            /// `ctx` must be a live handle.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(ctx: *mut HContext, value: $ty, eh: *mut *mut ContextEH) {
                guard($code, eh, (), || {
                    unsafe { context_mut(ctx) }?.set(value);
                    Ok(())
                })
            }
        )*
    };
}

scalar_putter! {
    ctx_put_long(i64) => codes::PUT_LONG;
    ctx_put_unsigned_long(u64) => codes::PUT_UNSIGNED_LONG;
    ctx_put_double(f64) => codes::PUT_DOUBLE;
    ctx_put_bool(bool) => codes::PUT_BOOL;
}

/// Store a new zeroed buffer of `size` bytes and return its address.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_alloc_data_ptr(
    ctx: *mut HContext,
    size: usize,
    eh: *mut *mut ContextEH,
) -> *mut u8 {
    guard(codes::ALLOC_DATA_PTR, eh, ptr::null_mut(), || {
        let ctx = unsafe { context_mut(ctx) }?;
        let buffer = SharedBuffer::zeroed(size)?;
        let data = buffer.as_mut_ptr();
        ctx.set(buffer);
        Ok(data)
    })
}

/// Store a buffer: a copy of `copy_sz` bytes at `data` when `copy_sz > 0`,
/// otherwise an alias of `data` that the caller keeps alive.
///
/// Returns the address held by the node.
///
/// # Safety
///
/// `ctx` must be a live handle. `data` must be readable for `copy_sz` bytes,
/// or, when aliased, outlive every copy of the node.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_put_data_ptr(
    ctx: *mut HContext,
    data: *mut u8,
    copy_sz: usize,
    eh: *mut *mut ContextEH,
) -> *mut u8 {
    guard(codes::PUT_DATA_PTR, eh, ptr::null_mut(), || {
        let ctx = unsafe { context_mut(ctx) }?;
        let buffer = if copy_sz > 0 && !data.is_null() {
            SharedBuffer::copy_from_slice(unsafe { slice::from_raw_parts(data, copy_sz) })?
        } else {
            unsafe { SharedBuffer::borrowed(data, 0) }.ok_or_else(|| misuse("null data pointer"))?
        };
        let stored = buffer.as_mut_ptr();
        ctx.set(buffer);
        Ok(stored)
    })
}

/// Store a copy of `copy_sz` bytes at `data`. Zero size is an error.
///
/// # Safety
///
/// `ctx` must be a live handle and `data` readable for `copy_sz` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_put_const_data_ptr(
    ctx: *mut HContext,
    data: *const u8,
    copy_sz: usize,
    eh: *mut *mut ContextEH,
) -> *mut u8 {
    guard(codes::PUT_CONST_DATA_PTR, eh, ptr::null_mut(), || {
        if copy_sz == 0 {
            return Err(misuse("const data should be copied but copy size is zero"));
        }
        if data.is_null() {
            return Err(misuse("null data pointer"));
        }
        let ctx = unsafe { context_mut(ctx) }?;
        let buffer = SharedBuffer::copy_from_slice(unsafe { slice::from_raw_parts(data, copy_sz) })?;
        let stored = buffer.as_mut_ptr();
        ctx.set(buffer);
        Ok(stored)
    })
}

// ============================================================================
// Getters
// ============================================================================

/// Read a string scalar.
///
/// With a non-null `buff`, copies the bytes without a terminator (size them
/// with [`ctx_get_str_size`]) and returns `buff`. With a null `buff`,
/// returns a new NUL-terminated copy to be freed with `ctx_free_str`.
///
/// # Safety
///
/// `ctx` must be a live handle; `buff` null or writable for the string size.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_str(
    ctx: *const HContext,
    buff: *mut c_char,
    eh: *mut *mut ContextEH,
) -> *mut c_char {
    guard(codes::GET_STR, eh, ptr::null_mut(), || {
        let s = unsafe { context(ctx) }?.get_ref::<String>()?;
        if buff.is_null() {
            return into_c_string(s).map(CString::into_raw);
        }
        unsafe { ptr::copy_nonoverlapping(s.as_ptr(), buff.cast::<u8>(), s.len()) };
        Ok(buff)
    })
}

/// Byte length of a string scalar, without terminator.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_str_size(ctx: *const HContext, eh: *mut *mut ContextEH) -> usize {
    guard(codes::GET_STR_SIZE, eh, 0, || {
        unsafe { context(ctx) }?.get_ref::<String>().map(String::len)
    })
}

macro_rules! scalar_getter {
    ($($name:ident -> $ty:ty => $code:path;)*) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` scalar; the stored type must match exactly.")]
            ///
            /// # Safety
            ///
            /// `ctx` must be a live handle.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(ctx: *const HContext, eh: *mut *mut ContextEH) -> $ty {
                guard($code, eh, <$ty>::default(), || unsafe { context(ctx) }?.get::<$ty>())
            }
        )*
    };
}

scalar_getter! {
    ctx_get_long -> i64 => codes::GET_LONG;
    ctx_get_unsigned_long -> u64 => codes::GET_UNSIGNED_LONG;
    ctx_get_double -> f64 => codes::GET_DOUBLE;
    ctx_get_bool -> bool => codes::GET_BOOL;
}

/// Address held by a buffer scalar.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_data_ptr(ctx: *const HContext, eh: *mut *mut ContextEH) -> *mut u8 {
    guard(codes::GET_DATA_PTR, eh, ptr::null_mut(), || {
        unsafe { context(ctx) }?
            .get_ref::<SharedBuffer>()
            .map(SharedBuffer::as_mut_ptr)
    })
}

/// Byte length of a buffer scalar; 0 for aliased foreign memory.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_data_size(ctx: *const HContext, eh: *mut *mut ContextEH) -> usize {
    guard(codes::GET_DATA_SIZE, eh, 0, || {
        unsafe { context(ctx) }?
            .get_ref::<SharedBuffer>()
            .map(SharedBuffer::len)
    })
}

// ============================================================================
// Shape
// ============================================================================

/// Number of children; scalars are an error.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_length(ctx: *const HContext, eh: *mut *mut ContextEH) -> usize {
    guard(codes::GET_LENGTH, eh, 0, || unsafe { context(ctx) }?.size())
}

/// The first `length` keys of an object in ascending order, as an array of
/// NUL-terminated strings to be freed with `ctx_free_keys(keys, length)`.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_get_keys(
    ctx: *const HContext,
    length: usize,
    eh: *mut *mut ContextEH,
) -> *mut *mut c_char {
    guard(codes::GET_KEYS, eh, ptr::null_mut(), || {
        let ctx = unsafe { context(ctx) }?;
        if length > ctx.size()? {
            report(
                ContextEH::new(codes::KEYS_LENGTH_EXCEEDED, "length exceeds current size"),
                eh,
            );
            return Ok(ptr::null_mut());
        }
        let keys = ctx
            .keys()?
            .take(length)
            .map(into_c_string)
            .collect::<Result<Vec<_>>>()?;
        let raw: Box<[*mut c_char]> = keys.into_iter().map(CString::into_raw).collect();
        Ok(Box::into_raw(raw).cast::<*mut c_char>())
    })
}

macro_rules! type_predicate {
    ($($(#[$meta:meta])* $name:ident => $code:path, |$c:ident| $test:expr;)*) => {
        $(
            $(#[$meta])*
            ///
            /// # Safety
            ///
            /// `ctx` must be a live handle.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(ctx: *const HContext, eh: *mut *mut ContextEH) -> bool {
                guard($code, eh, false, || unsafe { context(ctx) }.map(|$c| $test))
            }
        )*
    };
}

type_predicate! {
    /// Whether the node is `None`.
    ctx_is_none => codes::IS_NONE, |c| c.is_none();
    /// Whether the node is an array.
    ctx_is_array => codes::IS_ARRAY, |c| c.is_array();
    /// Whether the node is an object.
    ctx_is_object => codes::IS_OBJECT, |c| c.is_object();
    /// Whether the node holds a `bool`.
    ctx_is_bool => codes::IS_BOOL, |c| c.is::<bool>();
    /// Whether the node holds an `i64`.
    ctx_is_long => codes::IS_LONG, |c| c.is::<i64>();
    /// Whether the node holds a `u64`.
    ctx_is_unsigned_long => codes::IS_UNSIGNED_LONG, |c| c.is::<u64>();
    /// Whether the node holds an `f64`.
    ctx_is_double => codes::IS_DOUBLE, |c| c.is::<f64>();
    /// Whether the node holds a string.
    ctx_is_string => codes::IS_STRING, |c| c.is::<String>();
    /// Whether the node holds a byte buffer.
    ctx_is_data_ptr => codes::IS_DATA_PTR, |c| c.is::<SharedBuffer>();
}

// ============================================================================
// Arrays and JSON
// ============================================================================

/// Append `data` to an array (promoting `None`). With `copy` the source is
/// deep-copied; otherwise its content is moved out, leaving it `None`.
///
/// # Safety
///
/// Both handles must be live and must not alias each other's subtrees.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_push_back(
    ctx: *mut HContext,
    data: *mut HContext,
    copy: bool,
    eh: *mut *mut ContextEH,
) {
    guard(codes::PUSH_BACK, eh, (), || {
        let value = if copy {
            unsafe { context(data) }?.clone()
        } else {
            unsafe { context_mut(data) }?.take()
        };
        unsafe { context_mut(ctx) }?.push_back(value)
    })
}

/// Render a node as JSON, to be freed with `ctx_free_str`.
///
/// `indent < 0` is compact output; otherwise each level is indented with
/// `indent` copies of `indent_char`.
///
/// # Safety
///
/// `ctx` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_serialize(
    ctx: *const HContext,
    indent: i32,
    indent_char: c_char,
    ensure_ascii: bool,
    eh: *mut *mut ContextEH,
) -> *mut c_char {
    guard(codes::SERIALIZE, eh, ptr::null_mut(), || {
        let options = SerializeOptions {
            indent,
            indent_char: char::from(indent_char as u8),
            ensure_ascii,
            ..SerializeOptions::default()
        };
        let text = context_core::serialize(unsafe { context(ctx) }?, &options)?;
        into_c_string(&text).map(CString::into_raw)
    })
}

/// Parse JSON into a new owning handle. Empty input yields `None`.
///
/// # Safety
///
/// `json` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_deserialize(json: *const c_char, eh: *mut *mut ContextEH) -> *mut HContext {
    guard(codes::DESERIALIZE, eh, ptr::null_mut(), || {
        let text = unsafe { unbounded_str(json) }?;
        context_core::deserialize(text).map(owned_handle)
    })
}

// ============================================================================
// Memory
// ============================================================================

/// Free a string returned by `ctx_get_str` (null buffer) or `ctx_serialize`.
///
/// # Safety
///
/// `s` must be null or such a string, not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_free_str(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Free a key array returned by `ctx_get_keys`.
///
/// # Safety
///
/// `keys` must be null or such an array with the `length` it was requested
/// with, not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_free_keys(keys: *mut *mut c_char, length: usize) {
    if keys.is_null() {
        return;
    }
    let raw = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(keys, length)) };
    for &key in raw.iter() {
        unsafe { ctx_free_str(key) };
    }
}

impl From<HContext> for Context {
    fn from(handle: HContext) -> Self {
        handle.0
    }
}
