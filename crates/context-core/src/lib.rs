//! # context-core
//!
//! Dynamic, self-describing value tree used to pass configuration and results
//! between the processing blocks of an inference pipeline.
//!
//! A [`Context`] node is untyped (`None`), a typed scalar, an array, or an
//! object with ordered keys. Nodes take their shape from the first write,
//! scalars remember their exact Rust type, and the serializable subset of a
//! tree round-trips through JSON.
//!
//! ## Quick start
//!
//! ```rust
//! use context_core::{deserialize, serialize, Context, SerializeOptions};
//!
//! let mut ctx = Context::new();
//! ctx["unit_type"] = "FACE_DETECTOR".into();
//! ctx["confidence_threshold"] = 0.5.into();
//! ctx["objects"].push_back(Context::object()).unwrap();
//!
//! let json = serialize(&ctx, &SerializeOptions::default()).unwrap();
//! assert_eq!(
//!     json,
//!     r#"{"confidence_threshold":0.5,"objects":[{}],"unit_type":"FACE_DETECTOR"}"#
//! );
//!
//! let back = deserialize(&json).unwrap();
//! assert_eq!(back, ctx);
//! assert_eq!(back["confidence_threshold"].get_as::<f32>().unwrap(), 0.5);
//! ```
//!
//! ## Modules
//!
//! - [`value`] - the `Context` tree: lookup, promotion, mutation, equality
//! - [`scalar`] - `Storable` trait and the type-erased `Scalar`
//! - [`buffer`] - reference-counted `SharedBuffer` byte payloads
//! - [`coerce`] - `get_as` conversion ladders
//! - [`index`] - key and position addressing (`ContextIndex`)
//! - [`iter`] - borrowing iterators, cursors and erase positions
//! - [`json`] - JSON codec and `SerializeOptions`
//! - [`block`] - processing-block interface, registry and `Service`
//! - [`error`] - error kinds shared by every operation

pub mod block;
pub mod buffer;
pub mod coerce;
pub mod error;
pub mod index;
pub mod iter;
pub mod json;
pub mod scalar;
pub mod value;

pub use block::{BlockFactory, BlockRegistry, ProcessingBlock, Service};
pub use buffer::SharedBuffer;
pub use coerce::Coerce;
pub use error::{ContextError, Result};
pub use index::ContextIndex;
pub use iter::{Cursor, KeyValueCursor, Position, ValueCursor};
pub use json::{deserialize, from_json_value, serialize, to_json_value, SerializeOptions};
pub use scalar::{Scalar, Storable};
pub use value::Context;
