//! Cross-type numeric reads.
//!
//! `get_as::<T>()` matches the stored scalar against a fixed ladder of
//! candidate types and converts the first match into `T`. Conversions are
//! checked: a value that does not fit the target fails with
//! [`ContextError::BadConversion`] instead of wrapping, and a float only reads
//! as an integer when it has no fractional part.
//!
//! | target   | ladder                                                 |
//! |----------|--------------------------------------------------------|
//! | unsigned | u64 u32 u16 u8 i64 i32 i16 i8 f64 f32                  |
//! | signed   | i64 i32 i16 i8 u64 u32 u16 u8 f64 f32                  |
//! | float    | f32 f64 u64 i64 u32 i32 u16 i16 u8 i8                  |
//! | bool     | bool u64 i64 u32 i32 u16 i16 u8 i8 f32 f64             |
//! | String   | String, then bool as `"true"` / `"false"`              |

use crate::error::{ContextError, Result};
use crate::scalar::Scalar;

/// Target types of [`crate::Context::get_as`].
pub trait Coerce: Sized {
    fn coerce(scalar: &Scalar) -> Result<Self>;
}

/// Try `scalar` against each listed type in order, widening the first match.
macro_rules! first_match {
    ($scalar:expr; $($ty:ty => $wrap:expr),+ $(,)?) => {{
        let scalar: &Scalar = $scalar;
        None $(.or_else(|| scalar.peek::<$ty>().map(|v| $wrap(*v))))+
    }};
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i128),
    Float(f64),
}

fn unsigned_first(scalar: &Scalar) -> Option<Number> {
    first_match!(scalar;
        u64 => |v| Number::Integer(i128::from(v)),
        u32 => |v| Number::Integer(i128::from(v)),
        u16 => |v| Number::Integer(i128::from(v)),
        u8 => |v| Number::Integer(i128::from(v)),
        i64 => |v| Number::Integer(i128::from(v)),
        i32 => |v| Number::Integer(i128::from(v)),
        i16 => |v| Number::Integer(i128::from(v)),
        i8 => |v| Number::Integer(i128::from(v)),
        f64 => Number::Float,
        f32 => |v| Number::Float(f64::from(v)),
    )
}

fn signed_first(scalar: &Scalar) -> Option<Number> {
    first_match!(scalar;
        i64 => |v| Number::Integer(i128::from(v)),
        i32 => |v| Number::Integer(i128::from(v)),
        i16 => |v| Number::Integer(i128::from(v)),
        i8 => |v| Number::Integer(i128::from(v)),
        u64 => |v| Number::Integer(i128::from(v)),
        u32 => |v| Number::Integer(i128::from(v)),
        u16 => |v| Number::Integer(i128::from(v)),
        u8 => |v| Number::Integer(i128::from(v)),
        f64 => Number::Float,
        f32 => |v| Number::Float(f64::from(v)),
    )
}

fn no_ladder_match(scalar: &Scalar, target: &str) -> ContextError {
    ContextError::BadConversion(format!("{} cannot be read as {target}", scalar.type_name()))
}

fn out_of_range(value: impl std::fmt::Display, target: &str) -> ContextError {
    ContextError::BadConversion(format!("{value} does not fit in {target}"))
}

/// The exact integer value of `v`; fractions and values beyond 64 bits fail.
fn integral(v: f64, target: &str) -> Result<i128> {
    const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(ContextError::BadConversion(format!(
            "{v} has no exact {target} value"
        )));
    }
    if !(-TWO_POW_64..TWO_POW_64).contains(&v) {
        return Err(out_of_range(v, target));
    }
    Ok(v as i128)
}

macro_rules! coerce_integer {
    ($ladder:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl Coerce for $ty {
                fn coerce(scalar: &Scalar) -> Result<Self> {
                    let target = stringify!($ty);
                    let value = match $ladder(scalar) {
                        Some(Number::Integer(v)) => v,
                        Some(Number::Float(v)) => integral(v, target)?,
                        None => return Err(no_ladder_match(scalar, target)),
                    };
                    <$ty>::try_from(value).map_err(|_| out_of_range(value, target))
                }
            }
        )+
    };
}

coerce_integer!(unsigned_first => u8, u16, u32, u64, usize);
coerce_integer!(signed_first => i8, i16, i32, i64, isize);

fn float_first(scalar: &Scalar) -> Option<f64> {
    first_match!(scalar;
        f32 => f64::from,
        f64 => |v| v,
        u64 => |v| v as f64,
        i64 => |v| v as f64,
        u32 => f64::from,
        i32 => f64::from,
        u16 => f64::from,
        i16 => f64::from,
        u8 => f64::from,
        i8 => f64::from,
    )
}

impl Coerce for f64 {
    fn coerce(scalar: &Scalar) -> Result<Self> {
        float_first(scalar).ok_or_else(|| no_ladder_match(scalar, "f64"))
    }
}

impl Coerce for f32 {
    fn coerce(scalar: &Scalar) -> Result<Self> {
        let value = float_first(scalar).ok_or_else(|| no_ladder_match(scalar, "f32"))?;
        if value.is_finite() && value.abs() > f64::from(f32::MAX) {
            return Err(out_of_range(value, "f32"));
        }
        Ok(value as f32)
    }
}

impl Coerce for bool {
    fn coerce(scalar: &Scalar) -> Result<Self> {
        first_match!(scalar;
            bool => |v| v,
            u64 => |v| v != 0,
            i64 => |v| v != 0,
            u32 => |v| v != 0,
            i32 => |v| v != 0,
            u16 => |v| v != 0,
            i16 => |v| v != 0,
            u8 => |v| v != 0,
            i8 => |v| v != 0,
            f32 => |v| v != 0.0,
            f64 => |v| v != 0.0,
        )
        .ok_or_else(|| no_ladder_match(scalar, "bool"))
    }
}

impl Coerce for String {
    fn coerce(scalar: &Scalar) -> Result<Self> {
        if let Some(s) = scalar.peek::<String>() {
            return Ok(s.clone());
        }
        match scalar.peek::<bool>() {
            Some(true) => Ok("true".to_string()),
            Some(false) => Ok("false".to_string()),
            None => Err(no_ladder_match(scalar, "String")),
        }
    }
}
