//! Record descriptors ("pack" strings) and the fixed-stride record codec
//!
//! Each SxGeo table embeds a short textual descriptor in the file header
//! that fixes the layout of its records. A descriptor is a `/`-separated list
//! of `type:name` fields, for example
//!
//! ```text
//! T:id/c2:iso/n2:lat/n2:lon/b:name_ru/b:name_en
//! ```
//!
//! # Field types
//!
//! | token    | width | value                                   |
//! |----------|-------|-----------------------------------------|
//! | `t`/`T`  | 1     | signed / unsigned 8-bit integer         |
//! | `s`/`S`  | 2     | signed / unsigned 16-bit integer        |
//! | `m`/`M`  | 3     | signed / unsigned 24-bit integer        |
//! | `i`/`I`  | 4     | signed / unsigned 32-bit integer        |
//! | `f`      | 4     | IEEE 754 single                         |
//! | `d`      | 8     | IEEE 754 double                         |
//! | `n<k>`   | 2     | signed 16-bit fixed point, `k` decimals |
//! | `N<k>`   | 4     | signed 32-bit fixed point, `k` decimals |
//! | `c<k>`   | `k`   | space-padded string                     |
//! | `b`      | var   | NUL-terminated string                   |
//!
//! Numbers inside records are little-endian. Strings are stored in the
//! database charset (see [`Charset`]).

use crate::endian::{read_int_le, read_uint_le, write_uint_le};
use crate::error::{Result, SxGeoError};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Character set of record strings, from header byte 9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// UTF-8 (id 0)
    Utf8,
    /// ISO-8859-1, decoded as its Windows-1252 superset (id 1)
    Latin1,
    /// Windows-1251 Cyrillic (id 2)
    Cp1251,
}

impl Charset {
    /// Map the header id to a charset; unknown ids are `None`
    pub fn from_u8(id: u8) -> Option<Self> {
        match id {
            0 => Some(Charset::Utf8),
            1 => Some(Charset::Latin1),
            2 => Some(Charset::Cp1251),
            _ => None,
        }
    }

    /// Decode raw record bytes into text (lossy for invalid sequences)
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
            Charset::Cp1251 => encoding_rs::WINDOWS_1251
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
        }
    }

    /// Encode text into this charset
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Latin1 => encoding_rs::WINDOWS_1252.encode(text).0.into_owned(),
            Charset::Cp1251 => encoding_rs::WINDOWS_1251.encode(text).0.into_owned(),
        }
    }
}

/// Storage type of one descriptor field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer of `width` bytes (1..=4)
    Int {
        /// Width in bytes
        width: u8,
        /// Two's-complement when true
        signed: bool,
    },
    /// Signed integer storage with an implied decimal scale
    Fixed {
        /// Width in bytes (2 or 4)
        width: u8,
        /// Number of implied decimal places
        scale: u8,
    },
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Fixed-length string, right-padded with spaces
    Chars(usize),
    /// NUL-terminated string
    CString,
}

/// Longest `c<k>` field accepted
const MAX_CHARS: usize = u16::MAX as usize;

impl FieldKind {
    /// Parse a type token such as `M`, `n2` or `c3`
    pub fn parse(token: &str) -> Result<Self> {
        let mut chars = token.chars();
        let head = chars
            .next()
            .ok_or_else(|| SxGeoError::UnsupportedField(String::new()))?;
        let suffix = chars.as_str();

        let plain = |kind: FieldKind| {
            if suffix.is_empty() {
                Ok(kind)
            } else {
                Err(SxGeoError::UnsupportedField(token.to_string()))
            }
        };
        let number = || -> Result<usize> {
            if suffix.is_empty() {
                return Ok(0);
            }
            if !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SxGeoError::UnsupportedField(token.to_string()));
            }
            suffix
                .parse::<usize>()
                .map_err(|_| SxGeoError::UnsupportedField(token.to_string()))
        };

        match head {
            't' => plain(FieldKind::Int { width: 1, signed: true }),
            'T' => plain(FieldKind::Int { width: 1, signed: false }),
            's' => plain(FieldKind::Int { width: 2, signed: true }),
            'S' => plain(FieldKind::Int { width: 2, signed: false }),
            'm' => plain(FieldKind::Int { width: 3, signed: true }),
            'M' => plain(FieldKind::Int { width: 3, signed: false }),
            'i' => plain(FieldKind::Int { width: 4, signed: true }),
            'I' => plain(FieldKind::Int { width: 4, signed: false }),
            'f' => plain(FieldKind::Float),
            'd' => plain(FieldKind::Double),
            'b' => plain(FieldKind::CString),
            'n' | 'N' => {
                let scale = number()?;
                if scale > 9 {
                    return Err(SxGeoError::UnsupportedField(token.to_string()));
                }
                let width = if head == 'n' { 2 } else { 4 };
                Ok(FieldKind::Fixed {
                    width,
                    scale: scale as u8,
                })
            }
            // A record is at most a u16 stride wide
            'c' => match number()? {
                len @ 1..=MAX_CHARS => Ok(FieldKind::Chars(len)),
                _ => Err(SxGeoError::UnsupportedField(token.to_string())),
            },
            _ => Err(SxGeoError::UnsupportedField(token.to_string())),
        }
    }

    /// Width in bytes, `None` for NUL-terminated strings
    pub fn width(&self) -> Option<usize> {
        match *self {
            FieldKind::Int { width, .. } | FieldKind::Fixed { width, .. } => Some(width as usize),
            FieldKind::Float => Some(4),
            FieldKind::Double => Some(8),
            FieldKind::Chars(len) => Some(len),
            FieldKind::CString => None,
        }
    }

    fn token(&self) -> String {
        match *self {
            FieldKind::Int { width, signed } => {
                let c = match width {
                    1 => 't',
                    2 => 's',
                    3 => 'm',
                    _ => 'i',
                };
                if signed {
                    c.to_string()
                } else {
                    c.to_ascii_uppercase().to_string()
                }
            }
            FieldKind::Fixed { width: 2, scale } => format!("n{}", scale),
            FieldKind::Fixed { scale, .. } => format!("N{}", scale),
            FieldKind::Float => "f".to_string(),
            FieldKind::Double => "d".to_string(),
            FieldKind::Chars(len) => format!("c{}", len),
            FieldKind::CString => "b".to_string(),
        }
    }
}

/// One named field of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name (map key in decoded records)
    pub name: String,
    /// Storage type
    pub kind: FieldKind,
}

/// A decoded scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer (`t`, `s`, `m`, `i`)
    Int(i64),
    /// Unsigned integer (`T`, `S`, `M`, `I`)
    Uint(u64),
    /// Fixed-point number: `raw / 10^scale`
    Fixed {
        /// Stored integer
        raw: i64,
        /// Implied decimal places
        scale: u8,
    },
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// Text
    String(String),
}

impl Value {
    /// Integer view of `Int`/`Uint` values
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Unsigned view of non-negative integer values
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(v) => u64::try_from(v).ok(),
            Value::Uint(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view of any number
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(v) => Some(v as f64),
            Value::Uint(v) => Some(v as f64),
            Value::Fixed { raw, scale } => Some(raw as f64 / 10f64.powi(scale as i32)),
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            Value::String(_) => None,
        }
    }

    /// Text view of string values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Fixed { .. } => serializer.serialize_f64(self.as_f64().unwrap_or_default()),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

/// A decoded record: field name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    /// Take a field out of the record
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parsed descriptor for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    fields: Vec<FieldSpec>,
}

impl Descriptor {
    /// Parse descriptor text
    ///
    /// An empty string yields a descriptor with no fields, which is how a
    /// database without that table describes it.
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields: Vec<FieldSpec> = Vec::new();
        if text.is_empty() {
            return Ok(Self { fields });
        }

        for part in text.split('/') {
            let (token, name) = part.split_once(':').ok_or_else(|| {
                SxGeoError::InvalidFormat(format!("descriptor field '{}' has no name", part))
            })?;
            if name.is_empty() {
                return Err(SxGeoError::InvalidFormat(format!(
                    "descriptor field '{}' has an empty name",
                    part
                )));
            }
            if fields.iter().any(|f| f.name == name) {
                return Err(SxGeoError::InvalidFormat(format!(
                    "descriptor field '{}' appears twice",
                    name
                )));
            }
            fields.push(FieldSpec {
                name: name.to_string(),
                kind: FieldKind::parse(token)?,
            });
        }

        Ok(Self { fields })
    }

    /// Fields in storage order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// True when the descriptor has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether a field with this name exists
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Sum of the widths of all fixed-width fields, saturating
    pub fn fixed_width(&self) -> usize {
        self.fields
            .iter()
            .filter_map(|f| f.kind.width())
            .fold(0usize, usize::saturating_add)
    }

    /// True when every field has a fixed width
    pub fn is_fixed(&self) -> bool {
        self.fields.iter().all(|f| f.kind.width().is_some())
    }

    /// Check the descriptor against a table's declared record stride
    ///
    /// Fully fixed layouts must match the stride exactly. Layouts with
    /// NUL-terminated strings must leave room for at least one terminator
    /// per string.
    pub fn check_stride(&self, table: &str, stride: usize) -> Result<()> {
        let fixed = self.fixed_width();
        let terminators = self
            .fields
            .iter()
            .filter(|f| f.kind == FieldKind::CString)
            .count();
        let minimum = fixed + terminators;

        let fits = if self.is_fixed() {
            fixed == stride
        } else {
            minimum <= stride
        };

        if fits {
            Ok(())
        } else {
            Err(SxGeoError::InvalidFormat(format!(
                "{} descriptor needs {} bytes{} but the table stride is {}",
                table,
                minimum,
                if self.is_fixed() { "" } else { " or more" },
                stride
            )))
        }
    }

    /// Decode one record from the start of `bytes`
    ///
    /// Bytes after the last field are ignored.
    pub fn decode(&self, bytes: &[u8], charset: Charset) -> Result<Record> {
        let mut record = Record::new();
        let mut pos = 0usize;

        for field in &self.fields {
            let truncated = || {
                SxGeoError::InvalidFormat(format!(
                    "record truncated at field '{}' (offset {}, {} bytes)",
                    field.name,
                    pos,
                    bytes.len()
                ))
            };

            let (value, consumed) = match field.kind {
                FieldKind::Int { width, signed } => {
                    let width = width as usize;
                    let value = if signed {
                        Value::Int(read_int_le(bytes, pos, width).ok_or_else(truncated)?)
                    } else {
                        Value::Uint(read_uint_le(bytes, pos, width).ok_or_else(truncated)?)
                    };
                    (value, width)
                }
                FieldKind::Fixed { width, scale } => {
                    let width = width as usize;
                    let raw = read_int_le(bytes, pos, width).ok_or_else(truncated)?;
                    (Value::Fixed { raw, scale }, width)
                }
                FieldKind::Float => {
                    let bits = read_uint_le(bytes, pos, 4).ok_or_else(truncated)? as u32;
                    (Value::Float(f32::from_bits(bits)), 4)
                }
                FieldKind::Double => {
                    let bits = read_uint_le(bytes, pos, 8).ok_or_else(truncated)?;
                    (Value::Double(f64::from_bits(bits)), 8)
                }
                FieldKind::Chars(len) => {
                    let raw = bytes.get(pos..pos + len).ok_or_else(truncated)?;
                    let trimmed = match raw.iter().rposition(|&b| b != b' ') {
                        Some(last) => &raw[..=last],
                        None => &[][..],
                    };
                    (Value::String(charset.decode(trimmed)), len)
                }
                FieldKind::CString => {
                    let rest = bytes.get(pos..).ok_or_else(truncated)?;
                    let end = memchr::memchr(0, rest).ok_or_else(truncated)?;
                    (Value::String(charset.decode(&rest[..end])), end + 1)
                }
            };

            record.insert(field.name.clone(), value);
            pos += consumed;
        }

        Ok(record)
    }

    /// Encode a record with this layout
    ///
    /// The inverse of [`Descriptor::decode`]: fixed strings are padded with
    /// spaces, NUL-terminated strings get their terminator back.
    pub fn encode(&self, record: &Record, charset: Charset) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.fixed_width());

        for field in &self.fields {
            let value = record.get(&field.name).ok_or_else(|| {
                SxGeoError::InvalidFormat(format!("record has no field '{}'", field.name))
            })?;
            let mismatch = || {
                SxGeoError::InvalidFormat(format!(
                    "value {:?} does not fit field '{}' ({})",
                    value,
                    field.name,
                    field.kind.token()
                ))
            };

            match field.kind {
                FieldKind::Int { width, signed } => {
                    let width = width as usize;
                    let bits = width as u32 * 8;
                    let raw = if signed {
                        let v = value.as_i64().ok_or_else(mismatch)?;
                        let min = -(1i64 << (bits - 1));
                        let max = (1i64 << (bits - 1)) - 1;
                        if v < min || v > max {
                            return Err(mismatch());
                        }
                        v as u64
                    } else {
                        let v = value.as_u64().ok_or_else(mismatch)?;
                        if v >> bits != 0 {
                            return Err(mismatch());
                        }
                        v
                    };
                    write_uint_le(&mut out, raw, width);
                }
                FieldKind::Fixed { width, scale } => {
                    let raw = match *value {
                        Value::Fixed { raw, scale: s } if s == scale => raw,
                        _ => {
                            let v = value.as_f64().ok_or_else(mismatch)?;
                            (v * 10f64.powi(scale as i32)).round() as i64
                        }
                    };
                    let bits = width as u32 * 8;
                    if raw < -(1i64 << (bits - 1)) || raw > (1i64 << (bits - 1)) - 1 {
                        return Err(mismatch());
                    }
                    write_uint_le(&mut out, raw as u64, width as usize);
                }
                FieldKind::Float => {
                    let v = match *value {
                        Value::Float(v) => v,
                        _ => value.as_f64().ok_or_else(mismatch)? as f32,
                    };
                    out.extend_from_slice(&v.to_le_bytes());
                }
                FieldKind::Double => {
                    let v = value.as_f64().ok_or_else(mismatch)?;
                    out.extend_from_slice(&v.to_le_bytes());
                }
                FieldKind::Chars(len) => {
                    let bytes = charset.encode(value.as_str().ok_or_else(mismatch)?);
                    if bytes.len() > len {
                        return Err(mismatch());
                    }
                    out.extend_from_slice(&bytes);
                    out.resize(out.len() + len - bytes.len(), b' ');
                }
                FieldKind::CString => {
                    let bytes = charset.encode(value.as_str().ok_or_else(mismatch)?);
                    if memchr::memchr(0, &bytes).is_some() {
                        return Err(mismatch());
                    }
                    out.extend_from_slice(&bytes);
                    out.push(0);
                }
            }
        }

        Ok(out)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}:{}", field.kind.token(), field.name)?;
        }
        Ok(())
    }
}
