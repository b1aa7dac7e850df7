//! Minimal column access used by the aggregate functions.
//!
//! The query engine owns the real column storage. The aggregate functions only need to read
//! a typed value at a row position, so this module defines that contract ([`Column`]) plus
//! three in-memory implementations used by tests, benches and simple embedders.

use std::fmt::{Debug, Formatter};

/// Number of zero bytes kept after the last string of a [`StringColumn`], so reading 16
/// bytes from the start of any string stays inside the buffer.
pub const STRING_PADDING: usize = 16;

/// Logical type of an aggregate function argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float32,
    Float64,
    String,
    Tuple(Vec<DataType>),
}

impl DataType {
    /// Whether an exact distinct key for this type needs 128 bits
    #[inline]
    pub fn is_wide(&self) -> bool {
        matches!(
            self,
            DataType::UInt128 | DataType::Int128 | DataType::String | DataType::Tuple(_)
        )
    }
}

/// Value of a single row of a column.
#[derive(Clone, Copy, Debug)]
pub enum Value<'a> {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Float32(f32),
    Float64(f64),
    String(StrRef<'a>),
    Tuple(TupleRef<'a>),
}

/// Byte span of a string value.
///
/// The span may be followed by readable padding bytes which belong to the same buffer. The
/// short-string packer loads 16 bytes at once when padding is available.
#[derive(Clone, Copy)]
pub struct StrRef<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> StrRef<'a> {
    /// Create a span without padding
    #[inline]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            buf: bytes,
            len: bytes.len(),
        }
    }

    /// Create a span of `len` bytes at the start of `buf`, the rest of `buf` being padding
    #[inline]
    pub fn padded(buf: &'a [u8], len: usize) -> Self {
        assert!(len <= buf.len(), "string length {len} exceeds buffer of {}", buf.len());
        Self { buf, len }
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.buf[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First 16 bytes of the buffer including padding, if that many are readable
    #[inline]
    pub(crate) fn block16(&self) -> Option<&'a [u8; 16]> {
        self.buf.get(..16).and_then(|block| block.try_into().ok())
    }
}

impl Debug for StrRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl PartialEq for StrRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

/// Row of a tuple column: one value per element column.
#[derive(Clone, Copy)]
pub struct TupleRef<'a> {
    elements: &'a [Box<dyn Column>],
    row: usize,
}

impl<'a> TupleRef<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element values in element order
    #[inline]
    pub fn values(&self) -> impl Iterator<Item = Value<'a>> + 'a {
        let row = self.row;
        self.elements.iter().map(move |column| column.value(row))
    }
}

impl Debug for TupleRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}

/// Read-only access to column values by row position.
pub trait Column {
    fn data_type(&self) -> DataType;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return value at `row`. Panics if `row` is out of bounds.
    fn value(&self, row: usize) -> Value<'_>;
}

/// Fixed-width type which can be stored in a [`VectorColumn`].
pub trait NativeType: Copy {
    fn data_type() -> DataType;
    fn to_value(self) -> Value<'static>;
}

macro_rules! native_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl NativeType for $ty {
                #[inline]
                fn data_type() -> DataType {
                    DataType::$variant
                }

                #[inline]
                fn to_value(self) -> Value<'static> {
                    Value::$variant(self)
                }
            }
        )*
    };
}

native_type!(
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u128 => UInt128,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    f32 => Float32,
    f64 => Float64,
);

/// Column of fixed-width values
#[derive(Clone, Debug, Default)]
pub struct VectorColumn<T> {
    data: Vec<T>,
}

impl<T: NativeType> VectorColumn<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }

    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }
}

impl<T: NativeType> FromIterator<T> for VectorColumn<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: NativeType> Column for VectorColumn<T> {
    fn data_type(&self) -> DataType {
        T::data_type()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn value(&self, row: usize) -> Value<'_> {
        self.data[row].to_value()
    }
}

/// Column of byte strings stored contiguously, followed by [`STRING_PADDING`] zero bytes.
#[derive(Clone, Debug)]
pub struct StringColumn {
    chars: Vec<u8>,
    /// End offset of each string in `chars`
    offsets: Vec<usize>,
}

impl StringColumn {
    pub fn new() -> Self {
        Self {
            chars: vec![0; STRING_PADDING],
            offsets: Vec::new(),
        }
    }

    pub fn push(&mut self, value: impl AsRef<[u8]>) {
        let end = self.chars.len() - STRING_PADDING;
        self.chars.truncate(end);
        self.chars.extend_from_slice(value.as_ref());
        self.offsets.push(self.chars.len());
        self.chars.resize(self.chars.len() + STRING_PADDING, 0);
    }
}

impl Default for StringColumn {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AsRef<[u8]>> FromIterator<S> for StringColumn {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut column = Self::new();
        for value in iter {
            column.push(value);
        }
        column
    }
}

impl Column for StringColumn {
    fn data_type(&self) -> DataType {
        DataType::String
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    fn value(&self, row: usize) -> Value<'_> {
        let start = if row == 0 { 0 } else { self.offsets[row - 1] };
        let end = self.offsets[row];
        Value::String(StrRef::padded(&self.chars[start..], end - start))
    }
}

/// Column of tuples, stored as one column per element.
pub struct TupleColumn {
    elements: Vec<Box<dyn Column>>,
}

impl TupleColumn {
    /// Create tuple column from element columns, all of which must have the same length
    pub fn new(elements: Vec<Box<dyn Column>>) -> Self {
        if let Some(first) = elements.first() {
            let len = first.len();
            assert!(
                elements.iter().all(|e| e.len() == len),
                "tuple element columns must have equal length"
            );
        }
        Self { elements }
    }
}

impl Column for TupleColumn {
    fn data_type(&self) -> DataType {
        DataType::Tuple(self.elements.iter().map(|e| e.data_type()).collect())
    }

    fn len(&self) -> usize {
        self.elements.first().map_or(0, |e| e.len())
    }

    #[inline]
    fn value(&self, row: usize) -> Value<'_> {
        Value::Tuple(TupleRef {
            elements: &self.elements,
            row,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_column_padding() {
        let column: StringColumn = ["", "a", "hello world"].into_iter().collect();
        assert_eq!(column.len(), 3);

        for row in 0..column.len() {
            let Value::String(s) = column.value(row) else {
                panic!("expected string value");
            };
            assert!(s.block16().is_some(), "row {row} should expose 16 readable bytes");
        }

        let Value::String(s) = column.value(2) else {
            panic!("expected string value");
        };
        assert_eq!(s.as_bytes(), b"hello world");
    }

    #[test]
    fn test_tuple_column() {
        let column = TupleColumn::new(vec![
            Box::new(VectorColumn::new(vec![1u32, 2])),
            Box::new(["x", "y"].into_iter().collect::<StringColumn>()),
        ]);
        assert_eq!(
            column.data_type(),
            DataType::Tuple(vec![DataType::UInt32, DataType::String])
        );

        let Value::Tuple(t) = column.value(1) else {
            panic!("expected tuple value");
        };
        assert_eq!(format!("{:?}", t), "[UInt32(2), String(\"y\")]");
    }

    #[test]
    fn test_unpadded_str_ref() {
        let s = StrRef::new(b"short");
        assert!(s.block16().is_none());
        assert_eq!(s.len(), 5);
    }
}
