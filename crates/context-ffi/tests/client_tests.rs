//! Integration tests for the owning/weak client wrapper and the block ABI.

use std::ffi::CString;
use std::ptr;

use context_core::{Context, ContextError};
use context_ffi::block::{ctx_block_create, ctx_block_destroy, ctx_block_process, ctx_set_sdk_path};
use context_ffi::{codes, register_block, AbiError, ContextApi, ContextHandle, ContextRef};

// ============================================================================
// Owning handles and weak references
// ============================================================================

#[test]
fn weak_refs_write_into_the_parent() {
    let mut root = ContextHandle::new().unwrap();
    {
        let mut image = root.entry("image").unwrap();
        let mut shape = image.entry("shape").unwrap();
        for dim in [1080, 1920, 3] {
            let mut value = ContextHandle::new().unwrap();
            value.put_long(dim).unwrap();
            shape.push_back_move(&mut value).unwrap();
            assert!(value.is_none().unwrap());
        }
    }
    assert_eq!(root.to_json(-1).unwrap(), r#"{"image":{"shape":[1080,1920,3]}}"#);

    let mut image = root.get("image").unwrap();
    let mut shape = image.get("shape").unwrap();
    assert_eq!(shape.len().unwrap(), 3);
    assert_eq!(shape.index(-1).unwrap().get_long().unwrap(), 3);
}

#[test]
fn index_zero_builds_an_array_through_the_wrapper() {
    let mut root = ContextHandle::new().unwrap();
    root.index(0).unwrap().put_str("first").unwrap();
    assert!(root.is_array().unwrap());
    assert_eq!(root.to_json(-1).unwrap(), r#"["first"]"#);

    let err = root.index(3).err().unwrap();
    assert_eq!(err.code, codes::GET_BY_INDEX);
    assert_eq!(root.len().unwrap(), 1);
}

#[test]
fn errors_are_reraised_with_function_codes() {
    let mut root = ContextHandle::from_json("[1,2]").unwrap();
    let err = root.get("name").err().unwrap();
    assert_eq!(err.code, codes::GET_BY_KEY);
    assert!(err.message.contains("no item"));

    let err = root.index(5).err().unwrap();
    assert_eq!(err.code, codes::GET_BY_INDEX);
    assert!(err.to_string().contains("no index: 5"));

    let err = root.index(0).unwrap().get_str().err().unwrap();
    assert_eq!(err.code, codes::GET_STR_SIZE);
}

#[test]
fn destroyed_handle_reports_through_wrapper() {
    let mut root = ContextHandle::new().unwrap();
    root.put_long(1).unwrap();
    root.destroy().unwrap();
    assert!(root.is_destroyed());

    let err: AbiError = root.get_long().err().unwrap();
    assert_eq!(err.code, codes::GET_LONG);
    assert!(err.message.contains("null context handle"));
    assert!(root.root().is_err());
    root.destroy().unwrap();
}

#[test]
fn raw_handles_can_be_adopted() {
    let root = ContextHandle::new().unwrap();
    let raw = root.into_raw();
    let mut adopted = unsafe { ContextHandle::from_raw(raw) }.unwrap();
    adopted.root().unwrap().put_bool(false).unwrap();
    assert!(adopted.is_bool().unwrap());
    assert!(unsafe { ContextRef::from_raw(ptr::null_mut()) }.is_none());
}

#[test]
fn owning_assign_replaces_and_weak_assign_copies() {
    let source = ContextHandle::from_json(r#"{"a":1}"#).unwrap();

    let mut owner = ContextHandle::from_json(r#"{"old":true}"#).unwrap();
    owner.assign(&source).unwrap();
    assert_eq!(owner.to_json(-1).unwrap(), r#"{"a":1}"#);

    let mut root = ContextHandle::new().unwrap();
    root.entry("slot").unwrap().assign(&source).unwrap();
    assert_eq!(root.to_json(-1).unwrap(), r#"{"slot":{"a":1}}"#);

    owner.entry("a").unwrap().put_long(2).unwrap();
    assert_eq!(source.to_json(-1).unwrap(), r#"{"a":1}"#);
}

#[test]
fn typed_round_trip_through_the_wrapper() {
    let mut root = ContextHandle::new().unwrap();
    root.entry("name").unwrap().put_str("face").unwrap();
    root.entry("score").unwrap().put_double(0.75).unwrap();
    root.entry("id").unwrap().put_unsigned_long(42).unwrap();
    root.entry("visible").unwrap().put_bool(true).unwrap();
    root.entry("crop").unwrap().put_bytes(&[1, 2, 3]).unwrap();

    assert_eq!(root.get("name").unwrap().get_str().unwrap(), "face");
    assert_eq!(root.get("score").unwrap().get_double().unwrap(), 0.75);
    assert_eq!(root.get("id").unwrap().get_unsigned_long().unwrap(), 42);
    assert!(root.get("visible").unwrap().get_bool().unwrap());
    assert!(root.get("crop").unwrap().is_data().unwrap());
    assert_eq!(root.get("crop").unwrap().get_bytes().unwrap(), vec![1, 2, 3]);

    assert_eq!(root.keys().unwrap(), ["crop", "id", "name", "score", "visible"]);
    assert_eq!(
        root.to_json(-1).unwrap(),
        r#"{"id":42,"name":"face","score":0.75,"visible":true}"#
    );

    assert_eq!(root.erase("crop").unwrap(), 1);
    assert!(!root.contains("crop").unwrap());
}

#[test]
fn buffers_survive_their_first_owner() {
    let mut first = ContextHandle::new().unwrap();
    let data = first.alloc_data(3).unwrap();
    unsafe { std::slice::from_raw_parts_mut(data, 3) }.copy_from_slice(b"abc");

    let second = first.to_handle().unwrap();
    drop(first);
    assert_eq!(second.get_bytes().unwrap(), b"abc");
}

// ============================================================================
// Processing blocks
// ============================================================================

#[test]
fn blocks_run_through_the_abi() {
    register_block("COUNTER", |config: &Context| {
        let step = config.get_as_key_or("step", 1i64);
        let mut total = 0i64;
        Ok(Box::new(move |ctx: &mut Context| {
            total += step;
            ctx["total"] = total.into();
            Ok::<(), ContextError>(())
        }) as Box<dyn context_core::ProcessingBlock>)
    });

    let sdk = CString::new("/opt/sdk").unwrap();
    let mut eh = ptr::null_mut();
    unsafe { ctx_set_sdk_path(sdk.as_ptr(), &mut eh) };
    assert!(eh.is_null());

    let config = ContextHandle::from_json(r#"{"unit_type":"COUNTER","step":2}"#).unwrap();
    let mut data = ContextHandle::new().unwrap();
    unsafe {
        let block = ctx_block_create(config.raw(), &mut eh);
        assert!(!block.is_null());
        ctx_block_process(block, data.raw(), &mut eh);
        ctx_block_process(block, data.raw(), &mut eh);
        ctx_block_destroy(block, &mut eh);
    }
    assert!(eh.is_null());
    assert_eq!(data.get("total").unwrap().get_long().unwrap(), 4);
}

#[test]
fn factories_may_register_blocks_while_creating() {
    register_block("LAZY_PARENT", |_: &Context| {
        register_block("LAZY_CHILD", |_: &Context| {
            Ok(Box::new(|ctx: &mut Context| ctx.put("child", true))
                as Box<dyn context_core::ProcessingBlock>)
        });
        Ok(Box::new(|ctx: &mut Context| ctx.put("parent", true))
            as Box<dyn context_core::ProcessingBlock>)
    });

    let data = ContextHandle::new().unwrap();
    let mut eh = ptr::null_mut();
    for unit_type in ["LAZY_PARENT", "LAZY_CHILD"] {
        let config = ContextHandle::from_json(&format!(r#"{{"unit_type":"{unit_type}"}}"#)).unwrap();
        unsafe {
            let block = ctx_block_create(config.raw(), &mut eh);
            assert!(!block.is_null());
            ctx_block_process(block, data.raw(), &mut eh);
            ctx_block_destroy(block, &mut eh);
        }
        assert!(eh.is_null());
    }
    assert_eq!(data.to_json(-1).unwrap(), r#"{"child":true,"parent":true}"#);
}

#[test]
fn unknown_unit_type_fails_block_create() {
    let config = ContextHandle::from_json(r#"{"unit_type":"MISSING_UNIT"}"#).unwrap();
    let mut eh = ptr::null_mut();
    let block = unsafe { ctx_block_create(config.raw(), &mut eh) };
    assert!(block.is_null());
    assert!(!eh.is_null());
    unsafe {
        assert_eq!(context_ffi::error::ctx_error_code(eh), codes::BLOCK_CREATE);
        context_ffi::error::ctx_error_destroy(eh);
    }
}
