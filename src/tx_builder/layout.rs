//! Binary layout encoder for instruction data
//!
//! A [`Layout`] is a named schema: a leading discriminant (the instruction
//! type index) followed by an ordered list of named, typed fields. Encoding a
//! [`LayoutValues`] map against it yields the exact little-endian byte buffer
//! a program expects as instruction data.
//!
//! ## Rules
//! - The discriminant is always written first (`u8` or `u32`, little-endian)
//! - Integers are little-endian, `Bool` is a single `0`/`1` byte
//! - `Pubkey` and `Hash` are 32 raw bytes
//! - `Bytes` is a `u64` little-endian length followed by the bytes
//! - Missing fields, wrong value types and out-of-range numbers are rejected
//!
//! Encoding is pure: the same layout and values always produce the same bytes.

use std::collections::BTreeMap;

use solana_sdk::{hash::Hash, pubkey::Pubkey};
use thiserror::Error;

/// Errors raised while encoding or decoding against a layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field {field} expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Field {field} value {value} is out of range for {kind}")]
    OutOfRange {
        field: String,
        value: String,
        kind: &'static str,
    },

    #[error("Discriminant mismatch: expected {expected}, got {actual}")]
    DiscriminantMismatch { expected: u32, actual: u32 },

    #[error("Buffer truncated at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{0} trailing bytes after last field")]
    TrailingBytes(usize),

    #[error("Field {field} holds invalid bool byte {value}")]
    InvalidBool { field: String, value: u8 },
}

/// Instruction-type index written ahead of the fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminant {
    U8(u8),
    U32(u32),
}

impl Discriminant {
    pub fn value(&self) -> u32 {
        match self {
            Discriminant::U8(v) => *v as u32,
            Discriminant::U32(v) => *v,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Discriminant::U8(_) => 1,
            Discriminant::U32(_) => 4,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Discriminant::U8(v) => out.push(*v),
            Discriminant::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
}

/// Field type within a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    I64,
    Bool,
    Pubkey,
    Hash,
    /// Variable width: u64 length prefix followed by the bytes
    Bytes,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::U8 => "u8",
            FieldKind::U16 => "u16",
            FieldKind::U32 => "u32",
            FieldKind::U64 => "u64",
            FieldKind::I64 => "i64",
            FieldKind::Bool => "bool",
            FieldKind::Pubkey => "pubkey",
            FieldKind::Hash => "hash",
            FieldKind::Bytes => "bytes",
        }
    }

    /// Encoded size, or `None` for variable-width kinds
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            FieldKind::U8 | FieldKind::Bool => Some(1),
            FieldKind::U16 => Some(2),
            FieldKind::U32 => Some(4),
            FieldKind::U64 | FieldKind::I64 => Some(8),
            FieldKind::Pubkey | FieldKind::Hash => Some(32),
            FieldKind::Bytes => None,
        }
    }

    fn max_unsigned(&self) -> Option<u64> {
        match self {
            FieldKind::U8 => Some(u8::MAX as u64),
            FieldKind::U16 => Some(u16::MAX as u64),
            FieldKind::U32 => Some(u32::MAX as u64),
            FieldKind::U64 => Some(u64::MAX),
            _ => None,
        }
    }
}

/// A named, typed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Value supplied for a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Bool(bool),
    Pubkey(Pubkey),
    Hash(Hash),
    Bytes(Vec<u8>),
}

impl FieldValue {
    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Unsigned(_) => "unsigned integer",
            FieldValue::Signed(_) => "signed integer",
            FieldValue::Bool(_) => "bool",
            FieldValue::Pubkey(_) => "pubkey",
            FieldValue::Hash(_) => "hash",
            FieldValue::Bytes(_) => "bytes",
        }
    }
}

macro_rules! unsigned_from {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                FieldValue::Unsigned(v as u64)
            }
        })*
    };
}
unsigned_from!(u8, u16, u32, u64);

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Signed(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Signed(v as i64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<Pubkey> for FieldValue {
    fn from(v: Pubkey) -> Self {
        FieldValue::Pubkey(v)
    }
}

impl From<Hash> for FieldValue {
    fn from(v: Hash) -> Self {
        FieldValue::Hash(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        FieldValue::Bytes(v.to_vec())
    }
}

/// Named field values to encode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutValues {
    values: BTreeMap<String, FieldValue>,
}

impl LayoutValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        match self.values.get(name) {
            Some(FieldValue::Unsigned(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Schema for one instruction's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    name: String,
    discriminant: Discriminant,
    fields: Vec<Field>,
}

impl Layout {
    pub fn new(name: impl Into<String>, discriminant: Discriminant) -> Self {
        Self {
            name: name.into(),
            discriminant,
            fields: Vec::new(),
        }
    }

    /// Append a field; fields are encoded in declaration order
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discriminant(&self) -> Discriminant {
        self.discriminant
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Total encoded size when every field is fixed-width
    pub fn span(&self) -> Option<usize> {
        self.fields
            .iter()
            .try_fold(self.discriminant.size(), |acc, f| {
                f.kind.fixed_size().map(|s| acc + s)
            })
    }

    /// Encoded size for a concrete set of values
    pub fn encoded_len(&self, values: &LayoutValues) -> Result<usize, EncodingError> {
        if let Some(span) = self.span() {
            return Ok(span);
        }
        let mut len = self.discriminant.size();
        for field in &self.fields {
            len += match field.kind.fixed_size() {
                Some(size) => size,
                None => match values.get(&field.name) {
                    Some(FieldValue::Bytes(b)) => 8 + b.len(),
                    Some(other) => {
                        return Err(EncodingError::TypeMismatch {
                            field: field.name.clone(),
                            expected: field.kind.name(),
                            actual: other.type_name(),
                        })
                    }
                    None => return Err(EncodingError::MissingField(field.name.clone())),
                },
            };
        }
        Ok(len)
    }

    /// Encode `values` into instruction data
    pub fn encode(&self, values: &LayoutValues) -> Result<Vec<u8>, EncodingError> {
        if let Some(unknown) = values
            .values
            .keys()
            .find(|name| !self.fields.iter().any(|f| &f.name == *name))
        {
            return Err(EncodingError::UnknownField(unknown.clone()));
        }

        let mut out = Vec::with_capacity(self.encoded_len(values)?);
        self.discriminant.write(&mut out);

        for field in &self.fields {
            let value = values
                .get(&field.name)
                .ok_or_else(|| EncodingError::MissingField(field.name.clone()))?;
            encode_field(field, value, &mut out)?;
        }

        Ok(out)
    }

    /// Decode instruction data back into named values
    pub fn decode(&self, data: &[u8]) -> Result<LayoutValues, EncodingError> {
        let mut cursor = Cursor { data, offset: 0 };

        let actual = match self.discriminant {
            Discriminant::U8(_) => cursor.take(1)?[0] as u32,
            Discriminant::U32(_) => u32::from_le_bytes(cursor.array::<4>()?),
        };
        if actual != self.discriminant.value() {
            return Err(EncodingError::DiscriminantMismatch {
                expected: self.discriminant.value(),
                actual,
            });
        }

        let mut values = LayoutValues::new();
        for field in &self.fields {
            let value = match field.kind {
                FieldKind::U8 => FieldValue::Unsigned(cursor.take(1)?[0] as u64),
                FieldKind::U16 => FieldValue::Unsigned(u16::from_le_bytes(cursor.array()?) as u64),
                FieldKind::U32 => FieldValue::Unsigned(u32::from_le_bytes(cursor.array()?) as u64),
                FieldKind::U64 => FieldValue::Unsigned(u64::from_le_bytes(cursor.array()?)),
                FieldKind::I64 => FieldValue::Signed(i64::from_le_bytes(cursor.array()?)),
                FieldKind::Bool => match cursor.take(1)?[0] {
                    0 => FieldValue::Bool(false),
                    1 => FieldValue::Bool(true),
                    value => {
                        return Err(EncodingError::InvalidBool {
                            field: field.name.clone(),
                            value,
                        })
                    }
                },
                FieldKind::Pubkey => FieldValue::Pubkey(Pubkey::new_from_array(cursor.array()?)),
                FieldKind::Hash => FieldValue::Hash(Hash::new_from_array(cursor.array()?)),
                FieldKind::Bytes => {
                    let len = u64::from_le_bytes(cursor.array()?);
                    let len = usize::try_from(len).map_err(|_| EncodingError::Truncated {
                        offset: cursor.offset,
                        needed: usize::MAX,
                        available: data.len() - cursor.offset,
                    })?;
                    FieldValue::Bytes(cursor.take(len)?.to_vec())
                }
            };
            values.insert(field.name.clone(), value);
        }

        if cursor.offset != data.len() {
            return Err(EncodingError::TrailingBytes(data.len() - cursor.offset));
        }
        Ok(values)
    }
}

fn encode_field(field: &Field, value: &FieldValue, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    let mismatch = || EncodingError::TypeMismatch {
        field: field.name.clone(),
        expected: field.kind.name(),
        actual: value.type_name(),
    };
    let out_of_range = |v: String| EncodingError::OutOfRange {
        field: field.name.clone(),
        value: v,
        kind: field.kind.name(),
    };

    match field.kind {
        FieldKind::U8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64 => {
            let max = field.kind.max_unsigned().unwrap_or(u64::MAX);
            let v = match value {
                FieldValue::Unsigned(v) if *v <= max => *v,
                FieldValue::Unsigned(v) => return Err(out_of_range(v.to_string())),
                FieldValue::Signed(v) if *v >= 0 && (*v as u64) <= max => *v as u64,
                FieldValue::Signed(v) => return Err(out_of_range(v.to_string())),
                _ => return Err(mismatch()),
            };
            let bytes = v.to_le_bytes();
            let width = field.kind.fixed_size().unwrap_or(8);
            out.extend_from_slice(&bytes[..width]);
        }
        FieldKind::I64 => {
            let v = match value {
                FieldValue::Signed(v) => *v,
                FieldValue::Unsigned(v) => {
                    i64::try_from(*v).map_err(|_| out_of_range(v.to_string()))?
                }
                _ => return Err(mismatch()),
            };
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldKind::Bool => match value {
            FieldValue::Bool(b) => out.push(*b as u8),
            _ => return Err(mismatch()),
        },
        FieldKind::Pubkey => match value {
            FieldValue::Pubkey(p) => out.extend_from_slice(p.as_ref()),
            _ => return Err(mismatch()),
        },
        FieldKind::Hash => match value {
            FieldValue::Hash(h) => out.extend_from_slice(h.as_ref()),
            _ => return Err(mismatch()),
        },
        FieldKind::Bytes => match value {
            FieldValue::Bytes(b) => {
                out.extend_from_slice(&(b.len() as u64).to_le_bytes());
                out.extend_from_slice(b);
            }
            _ => return Err(mismatch()),
        },
    }
    Ok(())
}

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], EncodingError> {
        let available = self.data.len() - self.offset;
        if n > available {
            return Err(EncodingError::Truncated {
                offset: self.offset,
                needed: n,
                available,
            });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], EncodingError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }
}
