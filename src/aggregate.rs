//! ## Aggregate functions
//! `uniq`, `uniqHLL12` and `uniqExact` as seen by the query engine.
//!
//! An [`AggregateFunctionUniq`] is created once per query from the function name and the
//! argument types. It picks the set kind and the row key function up front, then drives
//! states created by [`AggregateFunctionUniq::create_state`] through add, merge,
//! serialization and result.
//!
//! ```
//! use uniq_estimator::{AggregateFunctionUniq, Column, DataType, UniqKind, VectorColumn};
//!
//! let uniq = AggregateFunctionUniq::new(UniqKind::UniqExact, &[DataType::UInt32]).unwrap();
//! let column = VectorColumn::new(vec![1u32, 2, 2, 3, 1]);
//! let mut state = uniq.create_state();
//! uniq.add_batch(&mut state, &[&column], 0..column.len());
//! assert_eq!(uniq.result(&state), 3);
//! ```

use std::fmt::{Debug, Display, Formatter};
use std::io::{Read, Write};
use std::ops::Range;
use std::str::FromStr;

use crate::column::{Column, DataType};
use crate::combinator::{Arguments, KeyFn};
use crate::error::UniqError;
use crate::exact::{ExactSet128, ExactSet64};
use crate::hyperloglog::HyperLogLogWithSmallSet;
use crate::state::{DistinctSet, UniqState};
use crate::uniques::UniquesHashSet;

/// Distinct count aggregate function kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniqKind {
    /// Adaptive sampling, exact up to 65536 distinct values
    Uniq,
    /// HyperLogLog with 2^12 registers, exact up to 16 distinct values
    UniqHll12,
    /// Exact hash set
    UniqExact,
}

impl UniqKind {
    /// Function name as used in queries
    pub const fn name(self) -> &'static str {
        match self {
            UniqKind::Uniq => "uniq",
            UniqKind::UniqHll12 => "uniqHLL12",
            UniqKind::UniqExact => "uniqExact",
        }
    }
}

impl FromStr for UniqKind {
    type Err = UniqError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "uniq" => Ok(UniqKind::Uniq),
            "uniqHLL12" => Ok(UniqKind::UniqHll12),
            "uniqExact" => Ok(UniqKind::UniqExact),
            _ => Err(UniqError::UnknownFunction(name.to_string())),
        }
    }
}

impl Display for UniqKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Distinct count aggregate function over fixed argument types
#[derive(Clone)]
pub struct AggregateFunctionUniq {
    kind: UniqKind,
    arguments: Arguments,
    key_fn: KeyFn,
}

impl Debug for AggregateFunctionUniq {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateFunctionUniq")
            .field("kind", &self.kind)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

impl AggregateFunctionUniq {
    /// Create aggregate function of `kind` over arguments of `types`
    pub fn new(kind: UniqKind, types: &[DataType]) -> Result<Self, UniqError> {
        let arguments = Arguments::from_types(types)?;
        let key_fn = arguments.key_fn(kind == UniqKind::UniqExact);
        log::debug!("created {kind} aggregate function over {arguments:?}");
        Ok(Self {
            kind,
            arguments,
            key_fn,
        })
    }

    /// Create aggregate function by name, e.g. `"uniqHLL12"`
    pub fn from_name(name: &str, types: &[DataType]) -> Result<Self, UniqError> {
        Self::new(name.parse()?, types)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    #[inline]
    pub fn kind(&self) -> UniqKind {
        self.kind
    }

    #[inline]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Result type of every `uniq*` function
    #[inline]
    pub fn return_type(&self) -> DataType {
        DataType::UInt64
    }

    /// Create empty state
    pub fn create_state(&self) -> UniqState {
        match self.kind {
            UniqKind::Uniq => UniquesHashSet::new().into(),
            UniqKind::UniqHll12 => HyperLogLogWithSmallSet::new().into(),
            UniqKind::UniqExact if self.arguments.is_wide() => ExactSet128::new().into(),
            UniqKind::UniqExact => ExactSet64::new().into(),
        }
    }

    /// Add row `row` of the argument columns to `state`
    #[inline]
    pub fn add(&self, state: &mut UniqState, columns: &[&dyn Column], row: usize) {
        debug_assert_eq!(columns.len(), self.arguments.count());
        state.insert_key((self.key_fn)(columns, row));
    }

    /// Add rows `rows` of the argument columns to `state`
    pub fn add_batch(&self, state: &mut UniqState, columns: &[&dyn Column], rows: Range<usize>) {
        debug_assert_eq!(columns.len(), self.arguments.count());
        for row in rows {
            state.insert_key((self.key_fn)(columns, row));
        }
    }

    /// Merge `rhs` into `state`
    #[inline]
    pub fn merge(&self, state: &mut UniqState, rhs: &UniqState) {
        state.merge(rhs);
    }

    /// Write `state` in binary format
    pub fn serialize<W: Write>(&self, state: &UniqState, w: &mut W) -> Result<(), UniqError> {
        state.write_to(w)?;
        Ok(())
    }

    /// Read state written by [`Self::serialize`]
    pub fn deserialize<R: Read>(&self, r: &mut R) -> Result<UniqState, UniqError> {
        let mut state = self.create_state();
        state.read_from(r)?;
        Ok(state)
    }

    /// Read state from `bytes`, which must hold exactly one serialized state
    pub fn deserialize_bytes(&self, mut bytes: &[u8]) -> Result<UniqState, UniqError> {
        let state = self.deserialize(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(UniqError::TrailingBytes(bytes.len()));
        }
        Ok(state)
    }

    /// Exact or estimated number of distinct rows added to `state`
    #[inline]
    pub fn result(&self, state: &UniqState) -> u64 {
        state.size()
    }
}
