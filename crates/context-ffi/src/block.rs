//! C functions over processing blocks.
//!
//! Blocks come from a process-wide [`Service`]. Hosts linking the library as
//! an `rlib` register their factories with [`register_block`] before C code
//! calls `ctx_block_create`.

use std::ffi::c_char;
use std::path::PathBuf;
use std::ptr;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use context_core::{Context, ProcessingBlock, Result, Service};

use crate::codes;
use crate::context::HContext;
use crate::error::{guard, misuse, ContextEH};

static SERVICE: LazyLock<Mutex<Service>> = LazyLock::new(|| Mutex::new(Service::new(".")));

fn service() -> MutexGuard<'static, Service> {
    SERVICE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opaque handle to a processing block.
pub struct HPBlock(Box<dyn ProcessingBlock>);

/// Register a block factory with the process-wide service.
pub fn register_block<F>(unit_type: &str, factory: F)
where
    F: Fn(&Context) -> Result<Box<dyn ProcessingBlock>> + Send + Sync + 'static,
{
    service().registry_mut().register(unit_type, factory);
}

/// Register a block factory with a default model file relative to the SDK path.
pub fn register_block_with_model<F>(unit_type: &str, model: impl Into<PathBuf>, factory: F)
where
    F: Fn(&Context) -> Result<Box<dyn ProcessingBlock>> + Send + Sync + 'static,
{
    service()
        .registry_mut()
        .register_with_model(unit_type, model, factory);
}

/// Point the process-wide service at a new SDK directory, keeping its
/// registered factories.
pub fn configure_sdk_path(sdk_path: impl Into<PathBuf>) {
    let mut svc = service();
    let registry = std::mem::take(svc.registry_mut());
    *svc = Service::with_registry(sdk_path, registry);
    tracing::debug!(sdk_path = %svc.sdk_path().display(), "SDK path configured");
}

/// Set the SDK directory used to resolve model files.
///
/// # Safety
///
/// `path` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_set_sdk_path(path: *const c_char, eh: *mut *mut ContextEH) {
    guard(codes::SET_SDK_PATH, eh, (), || {
        if path.is_null() {
            return Err(misuse("null SDK path"));
        }
        let path = unsafe { std::ffi::CStr::from_ptr(path) }
            .to_str()
            .map_err(|e| misuse(format!("SDK path is not valid UTF-8: {e}")))?;
        configure_sdk_path(path);
        Ok(())
    })
}

/// Create a block from a configuration Context. Destroy it with
/// `ctx_block_destroy`. The factory runs after the service lock is released,
/// so it may register further blocks.
///
/// # Safety
///
/// `config` must be a live Context handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_block_create(
    config: *const HContext,
    eh: *mut *mut ContextEH,
) -> *mut HPBlock {
    guard(codes::BLOCK_CREATE, eh, ptr::null_mut(), || {
        let config = unsafe { config.as_ref() }
            .ok_or_else(|| misuse("null config handle"))?
            .as_context();
        let (config, factory) = service().prepare(config)?;
        let block = factory(&config)?;
        Ok(Box::into_raw(Box::new(HPBlock(block))))
    })
}

/// Run a block over a Context.
///
/// # Safety
///
/// Both handles must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_block_process(
    block: *mut HPBlock,
    ctx: *mut HContext,
    eh: *mut *mut ContextEH,
) {
    guard(codes::BLOCK_PROCESS, eh, (), || {
        let block = unsafe { block.as_mut() }.ok_or_else(|| misuse("null block handle"))?;
        let ctx = unsafe { ctx.as_mut() }
            .ok_or_else(|| misuse("null context handle"))?
            .as_context_mut();
        block.0.process(ctx)
    })
}

/// Destroy a block. Null is ignored.
///
/// # Safety
///
/// `block` must be null or a block handle that has not been destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ctx_block_destroy(block: *mut HPBlock, eh: *mut *mut ContextEH) {
    guard(codes::BLOCK_DESTROY, eh, (), || {
        if !block.is_null() {
            drop(unsafe { Box::from_raw(block) });
        }
        Ok(())
    })
}
