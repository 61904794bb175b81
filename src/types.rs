//! Core types used throughout oscrelay.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the eight fixed connection positions managed by the registry.
///
/// Slots are numbered 1 through 8 to mirror the numbering presented by
/// configuration front-ends; slot 0 does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotId(u8);

impl SlotId {
    /// Lowest valid slot number.
    pub const FIRST: u8 = 1;
    /// Highest valid slot number.
    pub const LAST: u8 = 8;

    /// Create a slot ID, rejecting anything outside 1..=8.
    pub fn new(n: u8) -> Result<Self, Error> {
        if (Self::FIRST..=Self::LAST).contains(&n) {
            Ok(Self(n))
        } else {
            Err(Error::SlotOutOfRange(n))
        }
    }

    /// The slot number (1-based).
    pub fn get(self) -> u8 {
        self.0
    }

    /// Position in a 1-indexed slot table (index 0 is reserved).
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Iterate over all slots in order 1..=8.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::FIRST..=Self::LAST).map(Self)
    }
}

impl TryFrom<u8> for SlotId {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self, Error> {
        Self::new(n)
    }
}

impl From<SlotId> for u8 {
    fn from(slot: SlotId) -> Self {
        slot.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a connection runtime.
///
/// The cycle is `Closed -> Initializing -> Open -> Closed`; re-opening
/// after a close is a normal transition, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeState {
    /// No sockets or timers held.
    #[default]
    Closed,
    /// Sockets are being bound; not yet receiving.
    Initializing,
    /// All configured sockets bound, tasks running.
    Open,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Closed => "closed",
            Self::Initializing => "initializing",
            Self::Open => "open",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_range() {
        assert!(SlotId::new(0).is_err());
        assert!(SlotId::new(9).is_err());

        for n in 1..=8 {
            let slot = SlotId::new(n).unwrap();
            assert_eq!(slot.get(), n);
            assert_eq!(slot.index(), usize::from(n));
        }

        assert_eq!(SlotId::all().count(), 8);
    }

    #[test]
    fn test_slot_serde_rejects_out_of_range() {
        let ok: SlotId = toml::from_str::<std::collections::HashMap<String, SlotId>>("slot = 3")
            .unwrap()["slot"];
        assert_eq!(ok.get(), 3);

        assert!(toml::from_str::<std::collections::HashMap<String, SlotId>>("slot = 12").is_err());
    }
}
