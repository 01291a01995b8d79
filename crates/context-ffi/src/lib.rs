//! # context-ffi
//!
//! C ABI over the Context value tree, plus a safe Rust client that drives
//! the same exported functions.
//!
//! Every exported function takes a trailing `ContextEH** eh`. On success the
//! slot is left untouched; on failure it receives an error record carrying
//! the failing function's code and a message. Panics never cross the ABI.
//!
//! ## Quick start
//!
//! ```
//! use context_ffi::{ContextApi, ContextHandle};
//!
//! let mut root = ContextHandle::new().unwrap();
//! root.entry("name").unwrap().put_str("face").unwrap();
//! root.entry("score").unwrap().put_double(0.5).unwrap();
//! assert_eq!(root.to_json(-1).unwrap(), r#"{"name":"face","score":0.5}"#);
//!
//! let err = root.index(0).err().unwrap();
//! assert_eq!(err.code, context_ffi::codes::GET_BY_INDEX);
//! ```
//!
//! ## Modules
//!
//! - [`codes`] - Function codes carried by error records
//! - [`error`] - Error records and their accessors
//! - [`context`] - Context handle functions
//! - [`block`] - Processing-block functions and the process-wide service
//! - [`client`] - Owning and weak Rust wrappers

pub mod block;
pub mod client;
pub mod codes;
pub mod context;
pub mod error;

pub use block::{configure_sdk_path, register_block, register_block_with_model, HPBlock};
pub use client::{AbiError, ContextApi, ContextHandle, ContextRef};
pub use context::{HContext, MAX_STR_SIZE};
pub use error::ContextEH;
