//! Type-erased scalar payloads.
//!
//! Any type implementing [`Storable`] can live in a scalar node. The builtin
//! registrations cover `bool`, the fixed-width integers, `f32`, `f64`,
//! `String` and [`SharedBuffer`]. A scalar remembers its concrete type, and
//! typed reads only succeed for exactly that type; widening and narrowing go
//! through [`crate::coerce`].

use std::any::{Any, TypeId};
use std::fmt;

use serde_json::Value;

use crate::buffer::SharedBuffer;
use crate::error::{ContextError, Result};

/// A type that can be stored in a scalar Context node.
///
/// `scalar_eq` defaults to "never equal", so two scalars of a type that does
/// not define equality compare unequal even to themselves. `to_json` defaults
/// to `None`, which marks the type as having no JSON form.
pub trait Storable: Any + Clone + Send + fmt::Debug {
    /// Name used in type-mismatch messages.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn scalar_eq(&self, _other: &Self) -> bool {
        false
    }

    fn to_json(&self) -> Option<Value> {
        None
    }
}

macro_rules! register_storable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Storable for $ty {
                fn type_name() -> &'static str {
                    stringify!($ty)
                }

                fn scalar_eq(&self, other: &Self) -> bool {
                    self == other
                }

                fn to_json(&self) -> Option<Value> {
                    Some(Value::from(*self))
                }
            }
        )*
    };
}

register_storable!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl Storable for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn scalar_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn to_json(&self) -> Option<Value> {
        Some(Value::String(self.clone()))
    }
}

impl Storable for SharedBuffer {
    fn type_name() -> &'static str {
        "SharedBuffer"
    }

    fn scalar_eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Object-safe view of a [`Storable`].
trait ErasedScalar: Send + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_boxed(&self) -> Box<dyn ErasedScalar>;
    fn eq_erased(&self, other: &dyn ErasedScalar) -> bool;
    fn erased_type_name(&self) -> &'static str;
    fn erased_to_json(&self) -> Option<Value>;
}

impl<T: Storable> ErasedScalar for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedScalar> {
        Box::new(self.clone())
    }

    fn eq_erased(&self, other: &dyn ErasedScalar) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self.scalar_eq(other))
    }

    fn erased_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn erased_to_json(&self) -> Option<Value> {
        self.to_json()
    }
}

/// A single value of any [`Storable`] type.
pub struct Scalar {
    value: Box<dyn ErasedScalar>,
}

impl Scalar {
    pub fn new<T: Storable>(value: T) -> Self {
        Self {
            value: Box::new(value),
        }
    }

    /// Whether the stored value is exactly a `T`.
    pub fn is<T: Storable>(&self) -> bool {
        self.value.as_any().is::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        self.value.as_any().type_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.value.erased_type_name()
    }

    /// Borrow the value if it is exactly a `T`.
    pub fn peek<T: Storable>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }

    pub fn downcast_ref<T: Storable>(&self) -> Result<&T> {
        let stored = self.type_name();
        self.peek::<T>().ok_or(ContextError::TypeMismatch {
            requested: T::type_name(),
            stored,
        })
    }

    pub fn downcast_mut<T: Storable>(&mut self) -> Result<&mut T> {
        let stored = self.type_name();
        self.value
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(ContextError::TypeMismatch {
                requested: T::type_name(),
                stored,
            })
    }

    /// JSON form of the value, `None` when the type has none.
    pub fn to_json(&self) -> Option<Value> {
        self.value.erased_to_json()
    }
}

impl Clone for Scalar {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone_boxed(),
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.value.eq_erased(other.value.as_ref())
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}
