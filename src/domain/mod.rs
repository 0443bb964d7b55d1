//! Domain primitives for the character cache.
//!
//! Newtype wrappers keep character ids from being mixed with upstream
//! anime ids, and [`Rarity`] is the closed set of tiers every record lands in.

pub mod rarity;

pub use rarity::{Rarity, classify};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a character within one cache generation.
///
/// Ids supplied by an upstream source are kept when they are free in the
/// generation; everything else gets a synthetic id from
/// [`crate::cache::merge::synthetic_id`]. Ids are never guaranteed stable
/// across generations.
///
/// # Examples
///
/// ```rust
/// use gachadex::domain::CharacterId;
///
/// let id = CharacterId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(u32);

impl CharacterId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CharacterId {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl From<CharacterId> for u32 {
    fn from(id: CharacterId) -> Self {
        id.0
    }
}

impl FromStr for CharacterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Self::new)
    }
}
