//! Key and position addressing for [`Context`] children.
//!
//! `str`/`String` address object members, integers address array elements.
//! Negative integers count from the back of an array, so `-1` is the last
//! element. Literal indices like `ctx[0]` resolve to `i32`.

use crate::error::{ContextError, Result};
use crate::value::Context;

mod private {
    pub trait Sealed {}
    impl Sealed for str {}
    impl Sealed for String {}
    impl<T: Sealed + ?Sized> Sealed for &T {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for usize {}
}

/// Something that can address a child of a [`Context`].
pub trait ContextIndex: private::Sealed {
    /// Strict read-only lookup.
    fn lookup<'a>(&self, ctx: &'a Context) -> Result<&'a Context>;

    /// Strict mutable lookup. Never changes the shape of `ctx`.
    fn lookup_mut<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context>;

    /// Lookup that creates what is missing: a None node becomes an object
    /// (for keys) or a single-element array (for index 0), and a missing
    /// object member is inserted as None.
    fn get_or_insert<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context>;
}

fn scalar_not_indexable() -> ContextError {
    ContextError::invalid("a scalar Context has no children")
}

impl ContextIndex for str {
    fn lookup<'a>(&self, ctx: &'a Context) -> Result<&'a Context> {
        match ctx {
            Context::Object(map) => map
                .get(self)
                .ok_or_else(|| ContextError::MissingKey(self.to_string())),
            Context::Scalar(_) => Err(scalar_not_indexable()),
            Context::None | Context::Array(_) => Err(ContextError::MissingKey(self.to_string())),
        }
    }

    fn lookup_mut<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        match ctx {
            Context::Object(map) => map
                .get_mut(self)
                .ok_or_else(|| ContextError::MissingKey(self.to_string())),
            Context::Scalar(_) => Err(scalar_not_indexable()),
            Context::None | Context::Array(_) => Err(ContextError::MissingKey(self.to_string())),
        }
    }

    fn get_or_insert<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        if ctx.is_none() {
            *ctx = Context::object();
        }
        match ctx {
            Context::Object(map) => Ok(map.entry(self.to_string()).or_default()),
            Context::Scalar(_) => Err(scalar_not_indexable()),
            _ => Err(ContextError::MissingKey(self.to_string())),
        }
    }
}

impl ContextIndex for String {
    fn lookup<'a>(&self, ctx: &'a Context) -> Result<&'a Context> {
        self.as_str().lookup(ctx)
    }

    fn lookup_mut<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        self.as_str().lookup_mut(ctx)
    }

    fn get_or_insert<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        self.as_str().get_or_insert(ctx)
    }
}

impl<T: ContextIndex + ?Sized> ContextIndex for &T {
    fn lookup<'a>(&self, ctx: &'a Context) -> Result<&'a Context> {
        (**self).lookup(ctx)
    }

    fn lookup_mut<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        (**self).lookup_mut(ctx)
    }

    fn get_or_insert<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        (**self).get_or_insert(ctx)
    }
}

/// Map a possibly negative index onto `0..len`.
pub(crate) fn resolve(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

impl ContextIndex for i64 {
    fn lookup<'a>(&self, ctx: &'a Context) -> Result<&'a Context> {
        match ctx {
            Context::Array(items) => resolve(items.len(), *self)
                .map(|i| &items[i])
                .ok_or(ContextError::IndexOutOfRange(*self)),
            Context::Scalar(_) => Err(scalar_not_indexable()),
            Context::None | Context::Object(_) => Err(ContextError::IndexOutOfRange(*self)),
        }
    }

    fn lookup_mut<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        match ctx {
            Context::Array(items) => match resolve(items.len(), *self) {
                Some(i) => Ok(&mut items[i]),
                None => Err(ContextError::IndexOutOfRange(*self)),
            },
            Context::Scalar(_) => Err(scalar_not_indexable()),
            Context::None | Context::Object(_) => Err(ContextError::IndexOutOfRange(*self)),
        }
    }

    fn get_or_insert<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        if ctx.is_none() && *self == 0 {
            *ctx = Context::Array(vec![Context::None]);
        }
        self.lookup_mut(ctx)
    }
}

impl ContextIndex for i32 {
    fn lookup<'a>(&self, ctx: &'a Context) -> Result<&'a Context> {
        i64::from(*self).lookup(ctx)
    }

    fn lookup_mut<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        i64::from(*self).lookup_mut(ctx)
    }

    fn get_or_insert<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        i64::from(*self).get_or_insert(ctx)
    }
}

impl ContextIndex for usize {
    fn lookup<'a>(&self, ctx: &'a Context) -> Result<&'a Context> {
        let index = i64::try_from(*self).map_err(|_| ContextError::IndexOutOfRange(i64::MAX))?;
        index.lookup(ctx)
    }

    fn lookup_mut<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        let index = i64::try_from(*self).map_err(|_| ContextError::IndexOutOfRange(i64::MAX))?;
        index.lookup_mut(ctx)
    }

    fn get_or_insert<'a>(&self, ctx: &'a mut Context) -> Result<&'a mut Context> {
        let index = i64::try_from(*self).map_err(|_| ContextError::IndexOutOfRange(i64::MAX))?;
        index.get_or_insert(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_counts_from_the_back() {
        assert_eq!(resolve(3, -1), Some(2));
        assert_eq!(resolve(3, -3), Some(0));
        assert_eq!(resolve(3, -4), None);
        assert_eq!(resolve(3, 3), None);
        assert_eq!(resolve(0, 0), None);
    }
}
