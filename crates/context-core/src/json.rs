//! JSON codec for Context trees.
//!
//! Conversion goes through [`serde_json::Value`]:
//!
//! | Context                     | JSON                               |
//! |-----------------------------|------------------------------------|
//! | `None`                      | `null`                             |
//! | bool / integer / float      | boolean / number (non-finite: `null`) |
//! | `String`                    | string                             |
//! | `Array` / `Object`          | array / object, keys ascending     |
//! | scalar without a JSON form  | omitted (error in strict mode)     |
//!
//! Parsing maps integers to `i64`, integers beyond `i64` to `u64`, and every
//! other number to `f64`.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::{Map, Value};

use crate::error::{ContextError, Result};
use crate::value::Context;

/// Output settings for [`serialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Negative for compact output, otherwise the indent width per level.
    pub indent: i32,
    pub indent_char: char,
    /// Escape every non-ASCII character as `\uXXXX`.
    pub ensure_ascii: bool,
    /// Fail on scalars without a JSON form instead of omitting them.
    pub strict: bool,
    /// Render nested `None` nodes as `{}` instead of `null`.
    pub none_as_empty_object: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: -1,
            indent_char: ' ',
            ensure_ascii: false,
            strict: false,
            none_as_empty_object: false,
        }
    }
}

impl SerializeOptions {
    pub fn compact() -> Self {
        Self::default()
    }

    pub fn pretty(indent: u16) -> Self {
        Self {
            indent: i32::from(indent),
            ..Self::default()
        }
    }

    pub fn with_indent_char(mut self, indent_char: char) -> Self {
        self.indent_char = indent_char;
        self
    }

    pub fn with_ensure_ascii(mut self, ensure_ascii: bool) -> Self {
        self.ensure_ascii = ensure_ascii;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_none_as_empty_object(mut self, none_as_empty_object: bool) -> Self {
        self.none_as_empty_object = none_as_empty_object;
        self
    }
}

// ============================================================================
// Context -> JSON
// ============================================================================

fn encode(ctx: &Context, options: &SerializeOptions, nested: bool) -> Result<Option<Value>> {
    match ctx {
        Context::None if nested && options.none_as_empty_object => {
            Ok(Some(Value::Object(Map::new())))
        }
        Context::None => Ok(Some(Value::Null)),
        Context::Scalar(scalar) => match scalar.to_json() {
            Some(value) => Ok(Some(value)),
            None if options.strict => Err(ContextError::NotSerializable(scalar.type_name())),
            None => {
                tracing::debug!(
                    type_name = scalar.type_name(),
                    "skipping scalar without a JSON form"
                );
                Ok(None)
            }
        },
        Context::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(value) = encode(item, options, true)? {
                    out.push(value);
                }
            }
            Ok(Some(Value::Array(out)))
        }
        Context::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                if let Some(value) = encode(item, options, true)? {
                    out.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(out)))
        }
    }
}

/// Convert to a JSON value. A top-level scalar without a JSON form becomes `null`.
pub fn to_json_value(ctx: &Context, options: &SerializeOptions) -> Result<Value> {
    Ok(encode(ctx, options, false)?.unwrap_or(Value::Null))
}

/// Render `ctx` as JSON text.
pub fn serialize(ctx: &Context, options: &SerializeOptions) -> Result<String> {
    let value = to_json_value(ctx, options)?;
    if options.indent < 0 {
        render(&value, CompactFormatter, options.ensure_ascii)
    } else {
        let width = usize::try_from(options.indent).unwrap_or_default();
        let indent: String = std::iter::repeat_n(options.indent_char, width).collect();
        render(
            &value,
            PrettyFormatter::with_indent(indent.as_bytes()),
            options.ensure_ascii,
        )
    }
}

fn render<F: Formatter>(value: &Value, formatter: F, ensure_ascii: bool) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(
        &mut buf,
        AsciiFormatter {
            inner: formatter,
            ensure_ascii,
        },
    );
    value
        .serialize(&mut ser)
        .map_err(|e| ContextError::invalid(format!("JSON rendering failed: {e}")))?;
    String::from_utf8(buf).map_err(|e| ContextError::invalid(format!("JSON rendering failed: {e}")))
}

/// Layout from `inner`; string fragments optionally escaped to ASCII.
struct AsciiFormatter<F> {
    inner: F,
    ensure_ascii: bool,
}

/// Write `fragment` with every non-ASCII character as `\uXXXX`, using
/// surrogate pairs above the BMP.
fn write_ascii_fragment<W: ?Sized + io::Write>(writer: &mut W, fragment: &str) -> io::Result<()> {
    let mut rest = fragment;
    while let Some(pos) = rest.find(|c: char| !c.is_ascii()) {
        writer.write_all(&rest.as_bytes()[..pos])?;
        let mut chars = rest[pos..].chars();
        if let Some(c) = chars.next() {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
        }
        rest = chars.as_str();
    }
    writer.write_all(rest.as_bytes())
}

impl<F: Formatter> Formatter for AsciiFormatter<F> {
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        if self.ensure_ascii {
            write_ascii_fragment(writer, fragment)
        } else {
            self.inner.write_string_fragment(writer, fragment)
        }
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn end_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_key(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }
}

// ============================================================================
// JSON -> Context
// ============================================================================

pub fn from_json_value(value: Value) -> Context {
    match value {
        Value::Null => Context::None,
        Value::Bool(b) => Context::from(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Context::from(i)
            } else if let Some(u) = n.as_u64() {
                Context::from(u)
            } else {
                Context::from(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Context::from(s),
        Value::Array(items) => Context::Array(items.into_iter().map(from_json_value).collect()),
        Value::Object(map) => Context::Object(
            map.into_iter()
                .map(|(k, v)| (k, from_json_value(v)))
                .collect(),
        ),
    }
}

/// Parse JSON text. Blank input yields a `None` node.
pub fn deserialize(text: &str) -> Result<Context> {
    if text.trim().is_empty() {
        return Ok(Context::None);
    }
    let value: Value = serde_json::from_str(text)?;
    Ok(from_json_value(value))
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        to_json_value(self, &SerializeOptions::default())
            .map_err(<S::Error as serde::ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(from_json_value)
    }
}

impl FromStr for Context {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self> {
        deserialize(s)
    }
}

/// Compact JSON. `{:#}` pretty-prints with two spaces.
impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = if f.alternate() {
            SerializeOptions::pretty(2)
        } else {
            SerializeOptions::compact()
        };
        let text = serialize(self, &options).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
