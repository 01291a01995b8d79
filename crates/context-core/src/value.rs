//! The Context value tree.
//!
//! A [`Context`] node is either untyped (`None`), a single typed [`Scalar`],
//! an ordered `Array` of children, or an `Object` mapping string keys to
//! children in ascending key order.
//!
//! Nodes start out as `None` and take their shape from the first write:
//!
//! ```
//! use context_core::Context;
//!
//! let mut ctx = Context::new();
//! ctx["name"] = "face".into();
//! ctx["objects"][0]["score"] = 0.93.into();
//!
//! assert!(ctx.is_object());
//! assert_eq!(ctx["objects"].size().unwrap(), 1);
//! assert_eq!(ctx["objects"][0]["score"].get::<f64>().unwrap(), 0.93);
//! ```

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use crate::buffer::SharedBuffer;
use crate::coerce::Coerce;
use crate::error::{ContextError, Result};
use crate::index::ContextIndex;
use crate::scalar::{Scalar, Storable};

/// A dynamically shaped, recursively nested value.
#[derive(Debug, Clone, Default)]
pub enum Context {
    #[default]
    None,
    Scalar(Scalar),
    Array(Vec<Context>),
    Object(BTreeMap<String, Context>),
}

impl Context {
    pub fn new() -> Self {
        Self::None
    }

    pub fn array() -> Self {
        Self::Array(Vec::new())
    }

    pub fn object() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// Wrap any storable value, including client types with no JSON form.
    pub fn scalar<T: Storable>(value: T) -> Self {
        Self::Scalar(Scalar::new(value))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// `"none"`, `"scalar"`, `"array"` or `"object"`.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Scalar(_) => "scalar",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Stored scalar type name, or the variant name for non-scalars.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.type_name(),
            other => other.variant_name(),
        }
    }

    /// Whether this node is a scalar holding exactly a `T`.
    pub fn is<T: Storable>(&self) -> bool {
        matches!(self, Self::Scalar(s) if s.is::<T>())
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    // ========================================================================
    // Typed access
    // ========================================================================

    /// Copy out the stored value; fails unless the node holds exactly a `T`.
    pub fn get<T: Storable>(&self) -> Result<T> {
        self.get_ref::<T>().cloned()
    }

    pub fn get_ref<T: Storable>(&self) -> Result<&T> {
        match self {
            Self::Scalar(s) => s.downcast_ref::<T>(),
            other => Err(ContextError::TypeMismatch {
                requested: T::type_name(),
                stored: other.variant_name(),
            }),
        }
    }

    pub fn get_mut<T: Storable>(&mut self) -> Result<&mut T> {
        match self {
            Self::Scalar(s) => s.downcast_mut::<T>(),
            other => Err(ContextError::TypeMismatch {
                requested: T::type_name(),
                stored: other.variant_name(),
            }),
        }
    }

    pub fn get_or<T: Storable>(&self, default: T) -> T {
        self.get::<T>().unwrap_or(default)
    }

    /// Read through the coercion ladder of `T`.
    pub fn get_as<T: Coerce>(&self) -> Result<T> {
        match self {
            Self::Scalar(s) => T::coerce(s),
            other => Err(ContextError::BadConversion(format!(
                "{} Context has no value",
                other.variant_name()
            ))),
        }
    }

    pub fn get_as_or<T: Coerce>(&self, default: T) -> T {
        self.get_as::<T>().unwrap_or(default)
    }

    /// `self[key].get::<T>()`, or `default` on any failure.
    pub fn get_key_or<T: Storable>(&self, key: &str, default: T) -> T {
        match self.at(key) {
            Ok(child) => child.get_or(default),
            Err(_) => default,
        }
    }

    /// `self[key].get_as::<T>()`, or `default` on any failure.
    pub fn get_as_key_or<T: Coerce>(&self, key: &str, default: T) -> T {
        match self.at(key) {
            Ok(child) => child.get_as_or(default),
            Err(_) => default,
        }
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Get-or-promote lookup. See [`ContextIndex::get_or_insert`].
    pub fn item<I: ContextIndex>(&mut self, index: I) -> Result<&mut Context> {
        index.get_or_insert(self)
    }

    /// Strict lookup that never changes the tree.
    pub fn at<I: ContextIndex>(&self, index: I) -> Result<&Context> {
        index.lookup(self)
    }

    pub fn at_mut<I: ContextIndex>(&mut self, index: I) -> Result<&mut Context> {
        index.lookup_mut(self)
    }

    /// Strict lookup along a dot-separated path such as `objects.0.bbox`.
    ///
    /// Segments that parse as integers index into arrays; every other segment
    /// is an object key. The empty path addresses `self`.
    pub fn at_path(&self, path: &str) -> Result<&Context> {
        if path.is_empty() {
            return Ok(self);
        }
        path.split('.').try_fold(self, |node, segment| match segment.parse::<i64>() {
            Ok(index) if node.is_array() => node.at(index),
            _ => node.at(segment),
        })
    }

    /// Replace the whole node.
    pub fn set(&mut self, value: impl Into<Context>) {
        *self = value.into();
    }

    /// `self.item(key)?.set(value)`.
    pub fn put(&mut self, key: &str, value: impl Into<Context>) -> Result<()> {
        self.item(key)?.set(value);
        Ok(())
    }

    /// Append to an array, promoting `None` to an empty array first.
    pub fn push_back(&mut self, value: impl Into<Context>) -> Result<()> {
        if self.is_none() {
            *self = Self::array();
        }
        match self {
            Self::Array(items) => {
                items.push(value.into());
                Ok(())
            }
            other => Err(ContextError::invalid(format!(
                "push_back() is not applicable for {} Context",
                other.variant_name()
            ))),
        }
    }

    /// Remove an object member, returning how many were removed.
    pub fn erase(&mut self, key: &str) -> Result<usize> {
        match self {
            Self::Object(map) => Ok(usize::from(map.remove(key).is_some())),
            Self::None => Ok(0),
            other => Err(ContextError::invalid(format!(
                "erase(key) is not applicable for {} Context",
                other.variant_name()
            ))),
        }
    }

    /// Whether an object has `key`. `None` contains nothing.
    pub fn contains(&self, key: &str) -> Result<bool> {
        match self {
            Self::Object(map) => Ok(map.contains_key(key)),
            Self::None => Ok(false),
            other => Err(ContextError::invalid(format!(
                "contains() is not applicable for {} Context",
                other.variant_name()
            ))),
        }
    }

    pub fn count(&self, key: &str) -> Result<usize> {
        self.contains(key).map(usize::from)
    }

    /// Number of children. Scalars have no size.
    pub fn size(&self) -> Result<usize> {
        match self {
            Self::None => Ok(0),
            Self::Array(items) => Ok(items.len()),
            Self::Object(map) => Ok(map.len()),
            Self::Scalar(_) => Err(ContextError::invalid(
                "size() is not applicable for a scalar Context",
            )),
        }
    }

    /// True for `None` and for containers without children.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Array(items) => items.is_empty(),
            Self::Object(map) => map.is_empty(),
            Self::Scalar(_) => false,
        }
    }

    /// Reset to `None`.
    pub fn clear(&mut self) {
        *self = Self::None;
    }

    /// Move the content out, leaving `None` behind.
    pub fn take(&mut self) -> Context {
        std::mem::take(self)
    }

    /// Deep structural equality.
    pub fn compare(&self, other: &Context) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.compare(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.compare(vb))
            }
            _ => false,
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other)
    }
}

/// Strict read access.
///
/// # Panics
///
/// Panics when the child does not exist, like slice indexing.
impl<I: ContextIndex> Index<I> for Context {
    type Output = Context;

    fn index(&self, index: I) -> &Context {
        match index.lookup(self) {
            Ok(child) => child,
            Err(e) => panic!("{e}"),
        }
    }
}

/// Get-or-promote write access.
///
/// # Panics
///
/// Panics when the node cannot hold the child (a scalar, an array indexed by
/// key, or an index past the end of an array).
impl<I: ContextIndex> IndexMut<I> for Context {
    fn index_mut(&mut self, index: I) -> &mut Context {
        match index.get_or_insert(self) {
            Ok(child) => child,
            Err(e) => panic!("{e}"),
        }
    }
}

macro_rules! context_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Context {
                fn from(value: $ty) -> Self {
                    Self::scalar(value)
                }
            }
        )*
    };
}

context_from_scalar!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, SharedBuffer);

impl From<&str> for Context {
    fn from(value: &str) -> Self {
        Self::scalar(value.to_string())
    }
}

impl From<Scalar> for Context {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<Context>> for Context {
    fn from(items: Vec<Context>) -> Self {
        Self::Array(items)
    }
}

impl From<BTreeMap<String, Context>> for Context {
    fn from(map: BTreeMap<String, Context>) -> Self {
        Self::Object(map)
    }
}

impl FromIterator<Context> for Context {
    fn from_iter<I: IntoIterator<Item = Context>>(iter: I) -> Self {
        Self::Array(iter.into_iter().collect())
    }
}

impl<K: Into<String>> FromIterator<(K, Context)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Context)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
