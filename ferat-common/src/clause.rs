//! Clause identifiers

use crate::memory::Offset;
use std::{convert::TryInto, fmt};

/// An index uniquely identifying a clause of the QBF matrix
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default)]
pub struct Clause {
    pub index: ClauseIdentifierType,
}

/// The type that backs [Clause](struct.Clause.html).
pub type ClauseIdentifierType = u32;

impl Clause {
    /// Create the clause index with the given ID.
    pub fn new(index: ClauseIdentifierType) -> Clause {
        Clause { index }
    }
    /// Create the clause index with the given usize ID.
    /// # Panics
    /// Panics if the index exceeds the internal limit.
    pub fn from_usize(index: usize) -> Clause {
        requires!(index < ClauseIdentifierType::max_value().try_into().unwrap());
        Clause::new(index as ClauseIdentifierType)
    }
    /// Create an iterator from clause indices `start` up to (excluding) `end`.
    pub fn range(
        start: impl Offset,
        end: impl Offset,
    ) -> impl Iterator<Item = Clause> {
        (start.as_offset()..end.as_offset()).map(Clause::from_usize)
    }
}

impl Offset for Clause {
    fn as_offset(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}
