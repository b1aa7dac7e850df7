use std::io::{self, Read, Write};

use enum_dispatch::enum_dispatch;

use crate::error::UniqError;
use crate::exact::{ExactSet128, ExactSet64};
use crate::hash::Key;
use crate::hyperloglog::HyperLogLogWithSmallSet;
use crate::uniques::UniquesHashSet;

/// Aggregate state of a `uniq*` function: one distinct set, whose kind is fixed by the
/// aggregate function which created it.
#[derive(Clone, Debug, PartialEq)]
#[enum_dispatch]
pub enum UniqState {
    /// `uniq`
    Uniques(UniquesHashSet),
    /// `uniqHLL12`
    Hll12(HyperLogLogWithSmallSet),
    /// `uniqExact` over numbers up to 64 bits
    Exact(ExactSet64),
    /// `uniqExact` over wide numbers, strings and multiple arguments
    ExactWide(ExactSet128),
}

/// Distinct set trait which must be implemented by all state kinds.
#[enum_dispatch(UniqState)]
pub trait DistinctSet {
    fn insert_key(&mut self, key: Key);
    /// Exact or estimated number of distinct keys
    fn size(&self) -> u64;
    /// Memory size, including heap allocations
    fn size_of(&self) -> usize;
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()>;
    /// Replace contents by a set read from `r`
    fn read_from(&mut self, r: &mut dyn Read) -> Result<(), UniqError>;
    /// Name of the current internal representation
    fn representation(&self) -> &'static str;
    fn to_string(&self) -> String {
        format!(
            "representation: {}, estimate: {}, size: {}",
            self.representation(),
            self.size(),
            self.size_of()
        )
    }
}

const TAG_UNIQUES: u8 = 0;
const TAG_HLL12: u8 = 1;
const TAG_EXACT: u8 = 2;
const TAG_EXACT_WIDE: u8 = 3;

impl UniqState {
    /// Merge `rhs` into `self`.
    ///
    /// Panics if the states are of different kinds.
    pub fn merge(&mut self, rhs: &UniqState) {
        match (self, rhs) {
            (UniqState::Uniques(lhs), UniqState::Uniques(rhs)) => lhs.merge(rhs),
            (UniqState::Hll12(lhs), UniqState::Hll12(rhs)) => lhs.merge(rhs),
            (UniqState::Exact(lhs), UniqState::Exact(rhs)) => lhs.merge(rhs),
            (UniqState::ExactWide(lhs), UniqState::ExactWide(rhs)) => lhs.merge(rhs),
            (lhs, rhs) => panic!(
                "cannot merge {} state into {} state",
                rhs.kind_name(),
                lhs.kind_name()
            ),
        }
    }

    /// Return kind tag, used by the serde encoding
    #[inline]
    pub fn tag(&self) -> u8 {
        match self {
            UniqState::Uniques(_) => TAG_UNIQUES,
            UniqState::Hll12(_) => TAG_HLL12,
            UniqState::Exact(_) => TAG_EXACT,
            UniqState::ExactWide(_) => TAG_EXACT_WIDE,
        }
    }

    /// Create empty state of kind `tag`
    pub fn empty(tag: u8) -> Result<Self, UniqError> {
        match tag {
            TAG_UNIQUES => Ok(UniquesHashSet::new().into()),
            TAG_HLL12 => Ok(HyperLogLogWithSmallSet::new().into()),
            TAG_EXACT => Ok(ExactSet64::new().into()),
            TAG_EXACT_WIDE => Ok(ExactSet128::new().into()),
            _ => Err(UniqError::InvalidKind(tag)),
        }
    }

    /// Read state of kind `tag` from `payload`, which must be consumed entirely
    pub fn from_parts(tag: u8, mut payload: &[u8]) -> Result<Self, UniqError> {
        let mut state = Self::empty(tag)?;
        state.read_from(&mut payload)?;
        if !payload.is_empty() {
            return Err(UniqError::TrailingBytes(payload.len()));
        }
        Ok(state)
    }

    fn kind_name(&self) -> &'static str {
        match self {
            UniqState::Uniques(_) => "uniq",
            UniqState::Hll12(_) => "uniqHLL12",
            UniqState::Exact(_) | UniqState::ExactWide(_) => "uniqExact",
        }
    }
}
