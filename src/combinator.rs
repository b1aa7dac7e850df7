//! ## Multi-column keys
//! Aggregate functions accept several arguments, or a single tuple argument which is expanded
//! into its elements. Either way a row produces one key combining every element in order.
//!
//! The approximate functions fold 64-bit fingerprints with `Hash128to64`. The exact function
//! feeds the 128-bit exact key of every element to SipHash-2-4 and keeps the 128-bit digest.

use std::hash::Hasher;

use siphasher::sip128::{Hasher128, SipHasher24};

use crate::column::{Column, DataType, Value};
use crate::error::UniqError;
use crate::hash::{exact_key, fingerprint64, hash128_to_64, Key};

/// Computes the key of one row from the argument columns
pub type KeyFn = fn(&[&dyn Column], usize) -> Key;

/// Fold 64-bit fingerprints of `values` in order
#[inline]
pub fn combine64<'a>(values: impl IntoIterator<Item = Value<'a>>) -> u64 {
    let mut values = values.into_iter();
    let Some(first) = values.next() else {
        return 0;
    };
    values.fold(fingerprint64(first), |acc, value| {
        hash128_to_64(fingerprint64(value), acc)
    })
}

/// SipHash-2-4 128-bit digest of the exact keys of `values` in order
#[inline]
pub fn combine128<'a>(values: impl IntoIterator<Item = Value<'a>>) -> u128 {
    let mut hasher = SipHasher24::new();
    for value in values {
        hasher.write(&exact_key(value).to_u128().to_le_bytes());
    }
    hasher.finish128().as_u128()
}

/// Shape of the aggregate function arguments, fixed at construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arguments {
    /// One non-tuple argument
    Single(DataType),
    /// Several arguments
    Variadic(Vec<DataType>),
    /// One tuple argument, combined element-wise
    Tuple(Vec<DataType>),
}

impl Arguments {
    /// Validate argument types
    pub fn from_types(types: &[DataType]) -> Result<Self, UniqError> {
        match types {
            [] => Err(UniqError::NoArguments),
            [DataType::Tuple(elements)] => {
                check_tuple(elements)?;
                Ok(Arguments::Tuple(elements.clone()))
            }
            [single] => Ok(Arguments::Single(single.clone())),
            _ if types.iter().any(|t| matches!(t, DataType::Tuple(_))) => {
                Err(UniqError::TupleArgumentNotAlone { count: types.len() })
            }
            _ => Ok(Arguments::Variadic(types.to_vec())),
        }
    }

    /// Number of argument columns passed to `add`
    #[inline]
    pub fn count(&self) -> usize {
        match self {
            Arguments::Single(_) | Arguments::Tuple(_) => 1,
            Arguments::Variadic(types) => types.len(),
        }
    }

    /// Whether exact keys need 128 bits
    #[inline]
    pub fn is_wide(&self) -> bool {
        match self {
            Arguments::Single(data_type) => data_type.is_wide(),
            Arguments::Variadic(_) | Arguments::Tuple(_) => true,
        }
    }

    /// Select the row key function of approximate (`exact == false`) or exact sets
    pub fn key_fn(&self, exact: bool) -> KeyFn {
        match (self, exact) {
            // a tuple value folds its elements, see `fingerprint64` and `exact_key`
            (Arguments::Single(_) | Arguments::Tuple(_), false) => single_key64,
            (Arguments::Single(_) | Arguments::Tuple(_), true) => single_exact_key,
            (Arguments::Variadic(_), false) => variadic_key64,
            (Arguments::Variadic(_), true) => variadic_exact_key,
        }
    }
}

/// Reject tuples without elements, including nested ones
fn check_tuple(elements: &[DataType]) -> Result<(), UniqError> {
    if elements.is_empty() {
        return Err(UniqError::EmptyTuple);
    }
    for element in elements {
        if let DataType::Tuple(nested) = element {
            check_tuple(nested)?;
        }
    }
    Ok(())
}

fn single_key64(columns: &[&dyn Column], row: usize) -> Key {
    Key::Hash64(fingerprint64(columns[0].value(row)))
}

fn single_exact_key(columns: &[&dyn Column], row: usize) -> Key {
    exact_key(columns[0].value(row))
}

fn variadic_key64(columns: &[&dyn Column], row: usize) -> Key {
    Key::Hash64(combine64(columns.iter().map(|column| column.value(row))))
}

fn variadic_exact_key(columns: &[&dyn Column], row: usize) -> Key {
    Key::Hash128(combine128(columns.iter().map(|column| column.value(row))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{StringColumn, TupleColumn, VectorColumn};
    use test_case::test_case;

    fn tuple_of(types: Vec<DataType>) -> DataType {
        DataType::Tuple(types)
    }

    #[test_case(vec![] => "Err(NoArguments)")]
    #[test_case(vec![DataType::UInt8] => "Ok(Single(UInt8))")]
    #[test_case(vec![DataType::UInt8, DataType::String] => "Ok(Variadic([UInt8, String]))")]
    #[test_case(vec![tuple_of(vec![DataType::UInt8])] => "Ok(Tuple([UInt8]))")]
    #[test_case(vec![tuple_of(vec![])] => "Err(EmptyTuple)")]
    #[test_case(vec![tuple_of(vec![DataType::Int8, tuple_of(vec![])])] => "Err(EmptyTuple)")]
    #[test_case(vec![DataType::UInt8, tuple_of(vec![DataType::UInt8])]
        => "Err(TupleArgumentNotAlone { count: 2 })")]
    fn test_from_types(types: Vec<DataType>) -> String {
        format!("{:?}", Arguments::from_types(&types))
    }

    #[test_case(vec![DataType::UInt64] => (1, false))]
    #[test_case(vec![DataType::Float32] => (1, false))]
    #[test_case(vec![DataType::Int128] => (1, true))]
    #[test_case(vec![DataType::String] => (1, true))]
    #[test_case(vec![DataType::UInt8, DataType::UInt8, DataType::UInt8] => (3, true))]
    #[test_case(vec![tuple_of(vec![DataType::UInt8, DataType::UInt8])] => (1, true))]
    fn test_count_and_width(types: Vec<DataType>) -> (usize, bool) {
        let arguments = Arguments::from_types(&types).unwrap();
        (arguments.count(), arguments.is_wide())
    }

    #[test]
    fn test_order_sensitivity() {
        let a = VectorColumn::new(vec![1u32, 2]);
        let b = VectorColumn::new(vec![2u32, 1]);
        let ab: [&dyn Column; 2] = [&a, &b];
        let ba: [&dyn Column; 2] = [&b, &a];

        assert_ne!(variadic_key64(&ab, 0), variadic_key64(&ba, 0));
        assert_ne!(variadic_exact_key(&ab, 0), variadic_exact_key(&ba, 0));
        // (1, 2) in row 0 of `ab` is (1, 2) in row 1 of `ba`
        assert_eq!(variadic_key64(&ab, 0), variadic_key64(&ba, 1));
        assert_eq!(variadic_exact_key(&ab, 0), variadic_exact_key(&ba, 1));
    }

    #[test]
    fn test_tuple_matches_variadic() {
        let ids = VectorColumn::new(vec![7i64, -7]);
        let names: StringColumn = ["seven", "minus seven"].into_iter().collect();
        let variadic: [&dyn Column; 2] = [&ids, &names];

        let tuple = TupleColumn::new(vec![
            Box::new(VectorColumn::new(vec![7i64, -7])),
            Box::new(["seven", "minus seven"].into_iter().collect::<StringColumn>()),
        ]);
        let single: [&dyn Column; 1] = [&tuple];

        for row in 0..2 {
            assert_eq!(single_key64(&single, row), variadic_key64(&variadic, row));
            assert_eq!(
                single_exact_key(&single, row),
                variadic_exact_key(&variadic, row)
            );
        }
    }

    #[test]
    fn test_nested_tuple() {
        let inner = TupleColumn::new(vec![
            Box::new(VectorColumn::new(vec![1u8])),
            Box::new(VectorColumn::new(vec![2u8])),
        ]);
        let flat = TupleColumn::new(vec![
            Box::new(VectorColumn::new(vec![1u8])),
            Box::new(VectorColumn::new(vec![2u8])),
        ]);
        let nested = TupleColumn::new(vec![Box::new(inner)]);
        let nested_cols: [&dyn Column; 1] = [&nested];
        let flat_cols: [&dyn Column; 1] = [&flat];

        // ((1, 2)) folds the inner tuple to a single fingerprint
        assert_ne!(
            single_exact_key(&nested_cols, 0),
            single_exact_key(&flat_cols, 0)
        );
        assert_eq!(
            single_key64(&nested_cols, 0),
            Key::Hash64(combine64([Value::UInt8(1), Value::UInt8(2)]))
        );
    }

    #[test]
    fn test_combine_single_value() {
        assert_eq!(combine64([Value::UInt64(42)]), 42);
        assert_eq!(combine64(std::iter::empty()), 0);
    }
}
