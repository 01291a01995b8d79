//! Integration tests for the exported C functions, called the way C code
//! would: raw handles, explicit error slots, explicit frees.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use context_ffi::codes;
use context_ffi::context::*;
use context_ffi::error::{
    ctx_error_code, ctx_error_destroy, ctx_error_message, ctx_error_take_last,
};
use context_ffi::{ContextEH, HContext, MAX_STR_SIZE};

/// Helper: take the record out of a slot, returning (code, message).
fn take_error(eh: &mut *mut ContextEH) -> Option<(u32, String)> {
    if eh.is_null() {
        return None;
    }
    let record = std::mem::replace(eh, ptr::null_mut());
    let out = unsafe {
        (
            ctx_error_code(record),
            CStr::from_ptr(ctx_error_message(record)).to_string_lossy().into_owned(),
        )
    };
    unsafe { ctx_error_destroy(record) };
    Some(out)
}

fn new_root() -> *mut HContext {
    let mut eh = ptr::null_mut();
    let root = ctx_create(&mut eh);
    assert!(eh.is_null());
    assert!(!root.is_null());
    root
}

fn to_json(ctx: *const HContext) -> String {
    let mut eh = ptr::null_mut();
    let raw = unsafe { ctx_serialize(ctx, -1, b' ' as c_char, false, &mut eh) };
    assert!(eh.is_null());
    let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
    unsafe { ctx_free_str(raw) };
    text
}

// ============================================================================
// Error records
// ============================================================================

#[test]
fn key_lookup_on_array_reports_get_by_key() {
    let root = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        let second = ctx_get_by_index(root, 1, &mut eh);
        assert!(second.is_null());
        let (code, _) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::GET_BY_INDEX);
        assert!(ctx_is_none(root, &mut eh));

        let item = ctx_create(&mut eh);
        ctx_put_long(item, 1, &mut eh);
        ctx_push_back(root, item, false, &mut eh);
        assert!(eh.is_null());

        let key = CString::new("name").unwrap();
        let child = ctx_get_by_key(root, key.as_ptr(), &mut eh);
        assert!(child.is_null());
        let (code, message) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::GET_BY_KEY);
        assert!(message.contains("no item"), "{message}");

        ctx_destroy(item, &mut eh);
        ctx_destroy(root, &mut eh);
    }
    assert!(eh.is_null());
}

#[test]
fn null_error_slot_parks_the_record() {
    let _ = ctx_error_take_last();
    let root = new_root();
    unsafe {
        assert_eq!(ctx_get_long(root, ptr::null_mut()), 0);
        let parked = ctx_error_take_last();
        assert!(!parked.is_null());
        assert_eq!(ctx_error_code(parked), codes::GET_LONG);
        ctx_error_destroy(parked);
        ctx_destroy(root, ptr::null_mut());
    }
    assert!(ctx_error_take_last().is_null());
}

#[test]
fn error_accessors_reject_null_records() {
    let _ = ctx_error_take_last();
    unsafe {
        assert!(ctx_error_message(ptr::null()).is_null());
        let parked = ctx_error_take_last();
        assert_eq!(ctx_error_code(parked), codes::ERROR_ACCESS);
        ctx_error_destroy(parked);
        assert_eq!(ctx_error_code(ptr::null()), 0);
        let parked = ctx_error_take_last();
        assert!(!parked.is_null());
        ctx_error_destroy(parked);
    }
}

#[test]
fn null_handles_are_misuse_not_crashes() {
    let mut eh = ptr::null_mut();
    unsafe {
        assert!(!ctx_is_none(ptr::null(), &mut eh));
        let (code, message) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::IS_NONE);
        assert!(message.contains("null context handle"));

        ctx_put_str(ptr::null_mut(), ptr::null(), &mut eh);
        assert_eq!(take_error(&mut eh).unwrap().0, codes::PUT_STR);

        ctx_destroy(ptr::null_mut(), &mut eh);
        assert!(eh.is_null());
    }
}

// ============================================================================
// Scalars and strings
// ============================================================================

#[test]
fn putters_and_strict_getters() {
    let root = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        let key = CString::new("count").unwrap();
        let count = ctx_get_or_insert_by_key(root, key.as_ptr(), &mut eh);
        ctx_put_long(count, -7, &mut eh);
        assert_eq!(ctx_get_long(count, &mut eh), -7);
        assert!(ctx_is_long(count, &mut eh));
        assert!(!ctx_is_unsigned_long(count, &mut eh));
        assert!(eh.is_null());

        assert_eq!(ctx_get_double(count, &mut eh), 0.0);
        assert_eq!(take_error(&mut eh).unwrap().0, codes::GET_DOUBLE);

        ctx_put_unsigned_long(count, u64::MAX, &mut eh);
        assert_eq!(ctx_get_unsigned_long(count, &mut eh), u64::MAX);
        ctx_put_bool(count, true, &mut eh);
        assert!(ctx_get_bool(count, &mut eh));
        ctx_put_double(count, 0.25, &mut eh);
        assert_eq!(ctx_get_double(count, &mut eh), 0.25);
        assert!(eh.is_null());

        assert!(ctx_contains(root, key.as_ptr(), &mut eh));
        assert_eq!(ctx_erase_key(root, key.as_ptr(), &mut eh), 1);
        assert!(!ctx_contains(root, key.as_ptr(), &mut eh));
        assert!(eh.is_null());

        ctx_destroy(root, &mut eh);
    }
}

#[test]
fn strings_copy_into_caller_buffers() {
    let root = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        let value = CString::new("caf\u{e9}").unwrap();
        ctx_put_str(root, value.as_ptr(), &mut eh);
        let size = ctx_get_str_size(root, &mut eh);
        assert_eq!(size, 5);

        let mut buf = vec![0u8; size];
        let out = ctx_get_str(root, buf.as_mut_ptr().cast::<c_char>(), &mut eh);
        assert_eq!(out, buf.as_mut_ptr().cast::<c_char>());
        assert_eq!(std::str::from_utf8(&buf).unwrap(), "caf\u{e9}");

        let owned = ctx_get_str(root, ptr::null_mut(), &mut eh);
        assert_eq!(CStr::from_ptr(owned).to_str().unwrap(), "caf\u{e9}");
        ctx_free_str(owned);
        assert!(eh.is_null());

        ctx_destroy(root, &mut eh);
    }
}

#[test]
fn oversized_and_invalid_strings_are_rejected() {
    let root = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        let long = CString::new("x".repeat(MAX_STR_SIZE + 1)).unwrap();
        ctx_put_str(root, long.as_ptr(), &mut eh);
        let (code, message) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::PUT_STR);
        assert!(message.contains("exceeds"), "{message}");

        let exact = CString::new("x".repeat(MAX_STR_SIZE)).unwrap();
        ctx_put_str(root, exact.as_ptr(), &mut eh);
        assert!(eh.is_null());

        let invalid = [0xffu8, 0xfe, 0];
        ctx_put_str(root, invalid.as_ptr().cast::<c_char>(), &mut eh);
        let (_, message) = take_error(&mut eh).unwrap();
        assert!(message.contains("UTF-8"), "{message}");

        ctx_destroy(root, &mut eh);
    }
}

// ============================================================================
// Buffers
// ============================================================================

#[test]
fn cloned_buffers_outlive_their_source() {
    let root = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        let data = ctx_alloc_data_ptr(root, 4, &mut eh);
        assert!(!data.is_null());
        std::slice::from_raw_parts_mut(data, 4).copy_from_slice(&[1, 2, 3, 4]);
        assert!(ctx_is_data_ptr(root, &mut eh));

        let copy = ctx_clone(root, &mut eh);
        assert_eq!(ctx_get_data_ptr(copy, &mut eh), data);
        ctx_destroy(root, &mut eh);

        let data = ctx_get_data_ptr(copy, &mut eh);
        let size = ctx_get_data_size(copy, &mut eh);
        assert_eq!(std::slice::from_raw_parts(data, size), &[1, 2, 3, 4]);
        assert!(eh.is_null());
        ctx_destroy(copy, &mut eh);
    }
}

#[test]
fn data_pointers_copy_or_alias() {
    let root = new_root();
    let mut eh = ptr::null_mut();
    let mut source = [9u8, 8, 7];
    unsafe {
        let copied = ctx_put_data_ptr(root, source.as_mut_ptr(), source.len(), &mut eh);
        assert_ne!(copied, source.as_mut_ptr());
        assert_eq!(ctx_get_data_size(root, &mut eh), 3);

        let aliased = ctx_put_data_ptr(root, source.as_mut_ptr(), 0, &mut eh);
        assert_eq!(aliased, source.as_mut_ptr());
        assert_eq!(ctx_get_data_size(root, &mut eh), 0);

        let constant = ctx_put_const_data_ptr(root, source.as_ptr(), 2, &mut eh);
        assert_ne!(constant.cast_const(), source.as_ptr());
        assert!(eh.is_null());

        assert!(ctx_put_const_data_ptr(root, source.as_ptr(), 0, &mut eh).is_null());
        let (code, message) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::PUT_CONST_DATA_PTR);
        assert!(message.contains("copy size is zero"));

        ctx_destroy(root, &mut eh);
    }
}

// ============================================================================
// Shape, keys and arrays
// ============================================================================

#[test]
fn index_zero_promotes_a_fresh_handle() {
    let root = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        let first = ctx_get_by_index(root, 0, &mut eh);
        assert!(eh.is_null());
        assert!(!first.is_null());
        assert!(ctx_is_array(root, &mut eh));
        assert_eq!(ctx_get_length(root, &mut eh), 1);
        ctx_put_long(first, 7, &mut eh);
        assert_eq!(to_json(root), "[7]");

        assert!(ctx_get_by_index(root, 1, &mut eh).is_null());
        let (code, message) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::GET_BY_INDEX);
        assert_eq!(message, "no index: 1");
        assert_eq!(ctx_get_length(root, &mut eh), 1);

        ctx_destroy(root, &mut eh);
    }
}

#[test]
fn keys_come_back_sorted() {
    let json = CString::new(r#"{"b":1,"a":2,"c":3}"#).unwrap();
    let mut eh = ptr::null_mut();
    unsafe {
        let root = ctx_deserialize(json.as_ptr(), &mut eh);
        assert!(ctx_is_object(root, &mut eh));
        assert_eq!(ctx_get_length(root, &mut eh), 3);

        let keys = ctx_get_keys(root, 2, &mut eh);
        assert!(eh.is_null());
        let names: Vec<_> = (0..2)
            .map(|i| CStr::from_ptr(*keys.add(i)).to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["a", "b"]);
        ctx_free_keys(keys, 2);

        assert!(ctx_get_keys(root, 4, &mut eh).is_null());
        let (code, message) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::KEYS_LENGTH_EXCEEDED);
        assert_eq!(message, "length exceeds current size");

        ctx_destroy(root, &mut eh);
    }
}

#[test]
fn push_back_copies_or_moves() {
    let root = new_root();
    let item = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        ctx_put_long(item, 5, &mut eh);
        ctx_push_back(root, item, true, &mut eh);
        assert_eq!(ctx_get_long(item, &mut eh), 5);

        ctx_push_back(root, item, false, &mut eh);
        assert!(ctx_is_none(item, &mut eh));
        assert!(ctx_is_array(root, &mut eh));
        assert_eq!(ctx_get_length(root, &mut eh), 2);

        let last = ctx_get_by_index(root, -1, &mut eh);
        assert_eq!(ctx_get_long(last, &mut eh), 5);
        assert!(eh.is_null());

        ctx_put_long(last, 1, &mut eh);
        ctx_push_back(last, item, true, &mut eh);
        let (code, _) = take_error(&mut eh).unwrap();
        assert_eq!(code, codes::PUSH_BACK);

        ctx_destroy(item, &mut eh);
        ctx_destroy(root, &mut eh);
    }
}

#[test]
fn copy_overwrites_and_clear_resets() {
    let src = new_root();
    let dst = new_root();
    let mut eh = ptr::null_mut();
    unsafe {
        let key = CString::new("k").unwrap();
        ctx_put_str(ctx_get_or_insert_by_key(src, key.as_ptr(), &mut eh), key.as_ptr(), &mut eh);
        ctx_put_long(dst, 3, &mut eh);
        ctx_copy(src, dst, &mut eh);
        assert_eq!(to_json(dst), r#"{"k":"k"}"#);

        ctx_clear(dst, &mut eh);
        assert!(ctx_is_none(dst, &mut eh));
        assert_eq!(to_json(src), r#"{"k":"k"}"#);
        assert!(eh.is_null());

        ctx_destroy(src, &mut eh);
        ctx_destroy(dst, &mut eh);
    }
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn serialize_honours_layout_options() {
    let json = CString::new(r#"{"name":"café","ids":[1,2]}"#).unwrap();
    let mut eh = ptr::null_mut();
    unsafe {
        let root = ctx_deserialize(json.as_ptr(), &mut eh);
        assert_eq!(to_json(root), "{\"ids\":[1,2],\"name\":\"caf\u{e9}\"}");

        let raw = ctx_serialize(root, 1, b'\t' as c_char, true, &mut eh);
        let pretty = CStr::from_ptr(raw).to_str().unwrap().to_owned();
        ctx_free_str(raw);
        assert_eq!(
            pretty,
            "{\n\t\"ids\": [\n\t\t1,\n\t\t2\n\t],\n\t\"name\": \"caf\\u00e9\"\n}"
        );
        assert!(eh.is_null());
        ctx_destroy(root, &mut eh);
    }
}

#[test]
fn malformed_json_is_reported() {
    let json = CString::new("{not json").unwrap();
    let mut eh = ptr::null_mut();
    unsafe {
        assert!(ctx_deserialize(json.as_ptr(), &mut eh).is_null());
    }
    let (code, message) = take_error(&mut eh).unwrap();
    assert_eq!(code, codes::DESERIALIZE);
    assert!(message.starts_with("JSON parse error"), "{message}");
}
