//! Iteration over Context children.
//!
//! Two layers are provided:
//!
//! - Borrowing Rust iterators ([`Values`], [`ValuesMut`], [`Keys`],
//!   [`KeyValues`]) for ordinary `for` loops and adapters.
//! - Bidirectional cursors ([`ValueCursor`], [`KeyValueCursor`]) that can be
//!   stepped both ways, compared, and detached into a [`Position`] for
//!   [`Context::erase_at`] / [`Context::erase_range`].
//!
//! Arrays yield children in index order, objects in ascending key order.
//! A `None` node iterates as an empty container; scalars cannot be iterated.
//!
//! A `Position` taken before a structural mutation may address a different
//! child afterwards, or none at all.

use std::cmp::Ordering;
use std::collections::btree_map;
use std::ops::Bound;
use std::slice;

use crate::error::{ContextError, Result};
use crate::value::Context;

fn not_iterable(ctx: &Context) -> ContextError {
    ContextError::invalid(format!("a {} Context cannot be iterated", ctx.variant_name()))
}

fn not_associative(ctx: &Context) -> ContextError {
    ContextError::invalid(format!(
        "key-value iteration requires an object, found {}",
        ctx.variant_name()
    ))
}

fn no_random_access() -> ContextError {
    ContextError::invalid("no random access iterator for associative container")
}

// ============================================================================
// Borrowing iterators
// ============================================================================

/// Children of a node, in container order.
#[derive(Debug, Clone)]
pub enum Values<'a> {
    Empty,
    Seq(slice::Iter<'a, Context>),
    Map(btree_map::Values<'a, String, Context>),
}

impl<'a> Iterator for Values<'a> {
    type Item = &'a Context;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Empty => None,
            Self::Seq(it) => it.next(),
            Self::Map(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Empty => (0, Some(0)),
            Self::Seq(it) => it.size_hint(),
            Self::Map(it) => it.size_hint(),
        }
    }
}

impl DoubleEndedIterator for Values<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        match self {
            Self::Empty => None,
            Self::Seq(it) => it.next_back(),
            Self::Map(it) => it.next_back(),
        }
    }
}

impl ExactSizeIterator for Values<'_> {}

/// Mutable children of a node, in container order.
#[derive(Debug)]
pub enum ValuesMut<'a> {
    Empty,
    Seq(slice::IterMut<'a, Context>),
    Map(btree_map::ValuesMut<'a, String, Context>),
}

impl<'a> Iterator for ValuesMut<'a> {
    type Item = &'a mut Context;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Empty => None,
            Self::Seq(it) => it.next(),
            Self::Map(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Empty => (0, Some(0)),
            Self::Seq(it) => it.size_hint(),
            Self::Map(it) => it.size_hint(),
        }
    }
}

impl DoubleEndedIterator for ValuesMut<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        match self {
            Self::Empty => None,
            Self::Seq(it) => it.next_back(),
            Self::Map(it) => it.next_back(),
        }
    }
}

impl ExactSizeIterator for ValuesMut<'_> {}

/// Keys of an object.
#[derive(Debug, Clone)]
pub struct Keys<'a> {
    inner: Option<btree_map::Keys<'a, String, Context>>,
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next().map(String::as_str)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.as_ref().map_or((0, Some(0)), |it| it.size_hint())
    }
}

impl DoubleEndedIterator for Keys<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next_back().map(String::as_str)
    }
}

impl ExactSizeIterator for Keys<'_> {}

/// `(key, child)` pairs of an object.
#[derive(Debug, Clone)]
pub struct KeyValues<'a> {
    inner: btree_map::Iter<'a, String, Context>,
}

impl<'a> Iterator for KeyValues<'a> {
    type Item = (&'a str, &'a Context);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for KeyValues<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, v)| (k.as_str(), v))
    }
}

impl ExactSizeIterator for KeyValues<'_> {}

impl Context {
    /// Children in container order. Fails for scalars.
    pub fn iter(&self) -> Result<Values<'_>> {
        match self {
            Self::None => Ok(Values::Empty),
            Self::Array(items) => Ok(Values::Seq(items.iter())),
            Self::Object(map) => Ok(Values::Map(map.values())),
            Self::Scalar(_) => Err(not_iterable(self)),
        }
    }

    pub fn iter_mut(&mut self) -> Result<ValuesMut<'_>> {
        match self {
            Self::None => Ok(ValuesMut::Empty),
            Self::Array(items) => Ok(ValuesMut::Seq(items.iter_mut())),
            Self::Object(map) => Ok(ValuesMut::Map(map.values_mut())),
            Self::Scalar(_) => Err(not_iterable(self)),
        }
    }

    /// Object keys in ascending order; `None` has no keys.
    pub fn keys(&self) -> Result<Keys<'_>> {
        match self {
            Self::None => Ok(Keys { inner: None }),
            Self::Object(map) => Ok(Keys {
                inner: Some(map.keys()),
            }),
            other => Err(not_associative(other)),
        }
    }

    /// `(key, child)` pairs of an object.
    pub fn kv_iter(&self) -> Result<KeyValues<'_>> {
        match self {
            Self::Object(map) => Ok(KeyValues { inner: map.iter() }),
            other => Err(not_associative(other)),
        }
    }
}

/// Iterates the children; a scalar iterates as empty. Use [`Context::iter`]
/// to reject scalars instead.
impl<'a> IntoIterator for &'a Context {
    type Item = &'a Context;
    type IntoIter = Values<'a>;

    fn into_iter(self) -> Values<'a> {
        self.iter().unwrap_or(Values::Empty)
    }
}

// ============================================================================
// Positions
// ============================================================================

/// A detached cursor location.
///
/// Array positions run from `Index(0)` to `Index(len)`, the latter being the
/// end. Object positions name a key, with `End` past the last key. The end
/// of a `None` node is `End`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Position {
    Index(usize),
    Key(String),
    End,
}

fn first_position(ctx: &Context) -> Result<Position> {
    match ctx {
        Context::None => Ok(Position::End),
        Context::Array(_) => Ok(Position::Index(0)),
        Context::Object(map) => Ok(map
            .keys()
            .next()
            .map_or(Position::End, |k| Position::Key(k.clone()))),
        Context::Scalar(_) => Err(not_iterable(ctx)),
    }
}

fn end_position(ctx: &Context) -> Result<Position> {
    match ctx {
        Context::None | Context::Object(_) => Ok(Position::End),
        Context::Array(items) => Ok(Position::Index(items.len())),
        Context::Scalar(_) => Err(not_iterable(ctx)),
    }
}

fn key_after(map: &std::collections::BTreeMap<String, Context>, key: &str) -> Position {
    map.range::<str, _>((Bound::Excluded(key), Bound::Unbounded))
        .next()
        .map_or(Position::End, |(k, _)| Position::Key(k.clone()))
}

fn next_position(ctx: &Context, pos: &Position) -> Result<Position> {
    match (ctx, pos) {
        (Context::Array(items), Position::Index(i)) if *i < items.len() => {
            Ok(Position::Index(i + 1))
        }
        (Context::Object(map), Position::Key(k)) => Ok(key_after(map, k)),
        _ => Err(ContextError::invalid("cannot advance a cursor past the end")),
    }
}

fn prev_position(ctx: &Context, pos: &Position) -> Result<Position> {
    let before_begin = || ContextError::invalid("cannot move a cursor before the beginning");
    match (ctx, pos) {
        (Context::Array(_), Position::Index(i)) if *i > 0 => Ok(Position::Index(i - 1)),
        (Context::Object(map), Position::Key(k)) => map
            .range::<str, _>((Bound::Unbounded, Bound::Excluded(k.as_str())))
            .next_back()
            .map(|(k, _)| Position::Key(k.clone()))
            .ok_or_else(before_begin),
        (Context::Object(map), Position::End) => map
            .keys()
            .next_back()
            .map(|k| Position::Key(k.clone()))
            .ok_or_else(before_begin),
        _ => Err(before_begin()),
    }
}

fn entry_at<'a>(ctx: &'a Context, pos: &Position) -> Result<(Option<&'a str>, &'a Context)> {
    match (ctx, pos) {
        (Context::Array(items), Position::Index(i)) => items
            .get(*i)
            .map(|child| (None, child))
            .ok_or_else(|| ContextError::invalid("cannot dereference an end cursor")),
        (Context::Object(map), Position::Key(k)) => map
            .get_key_value(k.as_str())
            .map(|(k, v)| (Some(k.as_str()), v))
            .ok_or_else(|| ContextError::MissingKey(k.clone())),
        _ => Err(ContextError::invalid("cannot dereference an end cursor")),
    }
}

// ============================================================================
// Cursors
// ============================================================================

/// Operations shared by both cursor families.
pub trait Cursor: Clone {
    type Item;

    /// The element under the cursor; fails at the end.
    fn get(&self) -> Result<Self::Item>;

    /// Pre-increment.
    fn move_next(&mut self) -> Result<()>;

    /// Pre-decrement.
    fn move_prev(&mut self) -> Result<()>;

    fn position(&self) -> &Position;

    fn is_end(&self) -> bool;

    /// Post-increment: advance and return the cursor as it was.
    fn post_next(&mut self) -> Result<Self> {
        let before = self.clone();
        self.move_next()?;
        Ok(before)
    }

    /// Post-decrement.
    fn post_prev(&mut self) -> Result<Self> {
        let before = self.clone();
        self.move_prev()?;
        Ok(before)
    }
}

/// Cursor over the children of an array, object or `None` node.
#[derive(Debug, Clone)]
pub struct ValueCursor<'a> {
    ctx: &'a Context,
    pos: Position,
}

impl<'a> ValueCursor<'a> {
    pub fn into_position(self) -> Position {
        self.pos
    }

    /// Random-access step. Only arrays support it.
    pub fn advance(&mut self, n: isize) -> Result<()> {
        match (self.ctx, &self.pos) {
            (Context::Array(items), Position::Index(i)) => {
                let target = i
                    .checked_add_signed(n)
                    .filter(|t| *t <= items.len())
                    .ok_or_else(|| {
                        ContextError::invalid(format!("cursor offset {n} leaves the array"))
                    })?;
                self.pos = Position::Index(target);
                Ok(())
            }
            _ => Err(no_random_access()),
        }
    }

    /// `self - other`, as for random-access iterators.
    pub fn distance(&self, other: &ValueCursor<'_>) -> Result<isize> {
        match (self.ctx, &self.pos, &other.pos) {
            (Context::Array(_), Position::Index(a), Position::Index(b)) => {
                let a = isize::try_from(*a).map_err(|_| no_random_access())?;
                let b = isize::try_from(*b).map_err(|_| no_random_access())?;
                Ok(a - b)
            }
            _ => Err(no_random_access()),
        }
    }

    /// Ordering of two array cursors.
    pub fn cmp_position(&self, other: &ValueCursor<'_>) -> Result<Ordering> {
        self.distance(other).map(|d| d.cmp(&0))
    }
}

impl<'a> Cursor for ValueCursor<'a> {
    type Item = &'a Context;

    fn get(&self) -> Result<&'a Context> {
        entry_at(self.ctx, &self.pos).map(|(_, child)| child)
    }

    fn move_next(&mut self) -> Result<()> {
        self.pos = next_position(self.ctx, &self.pos)?;
        Ok(())
    }

    fn move_prev(&mut self) -> Result<()> {
        self.pos = prev_position(self.ctx, &self.pos)?;
        Ok(())
    }

    fn position(&self) -> &Position {
        &self.pos
    }

    fn is_end(&self) -> bool {
        match (self.ctx, &self.pos) {
            (Context::Array(items), Position::Index(i)) => *i >= items.len(),
            (_, Position::End) => true,
            _ => false,
        }
    }
}

impl PartialEq for ValueCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ctx, other.ctx) && self.pos == other.pos
    }
}

/// Cursor over the `(key, child)` pairs of an object.
#[derive(Debug, Clone)]
pub struct KeyValueCursor<'a> {
    ctx: &'a Context,
    pos: Position,
}

impl<'a> KeyValueCursor<'a> {
    pub fn key(&self) -> Result<&'a str> {
        self.get().map(|(k, _)| k)
    }

    pub fn value(&self) -> Result<&'a Context> {
        self.get().map(|(_, v)| v)
    }

    pub fn into_position(self) -> Position {
        self.pos
    }
}

impl<'a> Cursor for KeyValueCursor<'a> {
    type Item = (&'a str, &'a Context);

    fn get(&self) -> Result<(&'a str, &'a Context)> {
        match entry_at(self.ctx, &self.pos)? {
            (Some(k), v) => Ok((k, v)),
            (None, _) => Err(not_associative(self.ctx)),
        }
    }

    fn move_next(&mut self) -> Result<()> {
        self.pos = next_position(self.ctx, &self.pos)?;
        Ok(())
    }

    fn move_prev(&mut self) -> Result<()> {
        self.pos = prev_position(self.ctx, &self.pos)?;
        Ok(())
    }

    fn position(&self) -> &Position {
        &self.pos
    }

    fn is_end(&self) -> bool {
        self.pos == Position::End
    }
}

impl PartialEq for KeyValueCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ctx, other.ctx) && self.pos == other.pos
    }
}

impl Context {
    pub fn begin(&self) -> Result<ValueCursor<'_>> {
        Ok(ValueCursor {
            ctx: self,
            pos: first_position(self)?,
        })
    }

    pub fn end(&self) -> Result<ValueCursor<'_>> {
        Ok(ValueCursor {
            ctx: self,
            pos: end_position(self)?,
        })
    }

    /// Cursor at `key`, or the end cursor when the key is absent.
    pub fn find(&self, key: &str) -> Result<ValueCursor<'_>> {
        let pos = match self {
            Self::None => Position::End,
            Self::Object(map) if map.contains_key(key) => Position::Key(key.to_string()),
            Self::Object(_) => Position::End,
            other => {
                return Err(ContextError::invalid(format!(
                    "find() requires an object, found {}",
                    other.variant_name()
                )))
            }
        };
        Ok(ValueCursor { ctx: self, pos })
    }

    /// Cursor at `pos`, checked against the current shape of the node.
    pub fn cursor_at(&self, pos: Position) -> Result<ValueCursor<'_>> {
        let valid = match (self, &pos) {
            (Self::Array(items), Position::Index(i)) => *i <= items.len(),
            (Self::Object(map), Position::Key(k)) => map.contains_key(k.as_str()),
            (Self::Object(_) | Self::None, Position::End) => true,
            _ => false,
        };
        if !valid {
            return Err(ContextError::invalid(format!("stale cursor position {pos:?}")));
        }
        Ok(ValueCursor { ctx: self, pos })
    }

    pub fn kv_begin(&self) -> Result<KeyValueCursor<'_>> {
        if !self.is_object() {
            return Err(not_associative(self));
        }
        Ok(KeyValueCursor {
            ctx: self,
            pos: first_position(self)?,
        })
    }

    pub fn kv_end(&self) -> Result<KeyValueCursor<'_>> {
        if !self.is_object() {
            return Err(not_associative(self));
        }
        Ok(KeyValueCursor {
            ctx: self,
            pos: Position::End,
        })
    }

    pub fn kv_find(&self, key: &str) -> Result<KeyValueCursor<'_>> {
        match self {
            Self::Object(map) => {
                let pos = if map.contains_key(key) {
                    Position::Key(key.to_string())
                } else {
                    Position::End
                };
                Ok(KeyValueCursor { ctx: self, pos })
            }
            other => Err(not_associative(other)),
        }
    }

    /// Child under a detached position.
    pub fn at_position_mut(&mut self, pos: &Position) -> Result<&mut Context> {
        match (self, pos) {
            (Self::Array(items), Position::Index(i)) => items
                .get_mut(*i)
                .ok_or_else(|| ContextError::invalid("cannot dereference an end cursor")),
            (Self::Object(map), Position::Key(k)) => map
                .get_mut(k.as_str())
                .ok_or_else(|| ContextError::MissingKey(k.clone())),
            _ => Err(ContextError::invalid("cannot dereference an end cursor")),
        }
    }

    /// Remove the child at `pos` and return the position of the child that
    /// followed it.
    pub fn erase_at(&mut self, pos: &Position) -> Result<Position> {
        match (self, pos) {
            (Self::Array(items), Position::Index(i)) if *i < items.len() => {
                items.remove(*i);
                Ok(Position::Index(*i))
            }
            (Self::Object(map), Position::Key(k)) => {
                if map.remove(k.as_str()).is_none() {
                    return Err(ContextError::MissingKey(k.clone()));
                }
                Ok(key_after(map, k))
            }
            (other, _) => Err(ContextError::invalid(format!(
                "cannot erase at {pos:?} in {} Context",
                other.variant_name()
            ))),
        }
    }

    /// Remove the children in `[first, last)` and return `last`'s new position.
    pub fn erase_range(&mut self, first: &Position, last: &Position) -> Result<Position> {
        match (self, first, last) {
            (Self::Array(items), Position::Index(a), Position::Index(b))
                if a <= b && *b <= items.len() =>
            {
                items.drain(*a..*b);
                Ok(Position::Index(*a))
            }
            (Self::Object(_), Position::End, Position::End) => Ok(Position::End),
            (Self::Object(map), Position::Key(a), last @ (Position::Key(_) | Position::End)) => {
                let upper = match last {
                    Position::Key(b) if b.as_str() < a.as_str() => {
                        return Err(ContextError::invalid("erase range is reversed"))
                    }
                    Position::Key(b) => Bound::Excluded(b.as_str()),
                    _ => Bound::Unbounded,
                };
                let doomed: Vec<String> = map
                    .range::<str, _>((Bound::Included(a.as_str()), upper))
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in &doomed {
                    map.remove(key.as_str());
                }
                Ok(last.clone())
            }
            (other, _, _) => Err(ContextError::invalid(format!(
                "cannot erase range {first:?}..{last:?} in {} Context",
                other.variant_name()
            ))),
        }
    }
}
