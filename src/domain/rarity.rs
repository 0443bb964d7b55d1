use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rarity tier assigned to every cached character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// Tier order used for bucket layout and for the empty-bucket fallback.
    ///
    /// The fallback always starts at `Common`, whatever tier was requested.
    pub const FALLBACK_ORDER: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    /// Bucket slot of this tier inside a generation.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Common => 0,
            Self::Uncommon => 1,
            Self::Rare => 2,
            Self::Epic => 3,
            Self::Legendary => 4,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rarity '{0}', expected one of common, uncommon, rare, epic, legendary")]
pub struct UnknownRarity(pub String);

impl FromStr for Rarity {
    type Err = UnknownRarity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" => Ok(Self::Common),
            "uncommon" => Ok(Self::Uncommon),
            "rare" => Ok(Self::Rare),
            "epic" => Ok(Self::Epic),
            "legendary" => Ok(Self::Legendary),
            _ => Err(UnknownRarity(s.to_string())),
        }
    }
}

const CHARACTER_WEIGHT: f64 = 0.8;
const ANIME_WEIGHT: f64 = 0.2;

/// Maps character favourites to a 1-5 popularity score.
#[must_use]
pub const fn character_score(favorites: u64) -> u8 {
    match favorites {
        7000.. => 5,
        3000..7000 => 4,
        800..3000 => 3,
        150..800 => 2,
        _ => 1,
    }
}

/// Maps the popularity of the containing work to a 1-5 score.
#[must_use]
pub const fn anime_score(anime_popularity: u64) -> u8 {
    match anime_popularity {
        2_000_000.. => 5,
        1_000_000..2_000_000 => 4,
        500_000..1_000_000 => 3,
        100_000..500_000 => 2,
        _ => 1,
    }
}

/// Classifies a character by its own popularity (80%) and the popularity
/// of its work (20%).
///
/// # Examples
///
/// ```rust
/// use gachadex::domain::{Rarity, classify};
///
/// assert_eq!(classify(8000, 2_500_000), Rarity::Legendary);
/// assert_eq!(classify(100, 50_000), Rarity::Common);
/// ```
#[must_use]
pub fn classify(favorites: u64, anime_popularity: u64) -> Rarity {
    let combined = f64::from(character_score(favorites)) * CHARACTER_WEIGHT
        + f64::from(anime_score(anime_popularity)) * ANIME_WEIGHT;

    if combined >= 4.5 {
        Rarity::Legendary
    } else if combined >= 3.5 {
        Rarity::Epic
    } else if combined >= 2.5 {
        Rarity::Rare
    } else if combined >= 1.5 {
        Rarity::Uncommon
    } else {
        Rarity::Common
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_thresholds_are_inclusive() {
        assert_eq!(character_score(0), 1);
        assert_eq!(character_score(149), 1);
        assert_eq!(character_score(150), 2);
        assert_eq!(character_score(800), 3);
        assert_eq!(character_score(3000), 4);
        assert_eq!(character_score(6999), 4);
        assert_eq!(character_score(7000), 5);

        assert_eq!(anime_score(99_999), 1);
        assert_eq!(anime_score(100_000), 2);
        assert_eq!(anime_score(500_000), 3);
        assert_eq!(anime_score(1_000_000), 4);
        assert_eq!(anime_score(2_000_000), 5);
    }

    #[test]
    fn classify_reference_points() {
        // 5*0.8 + 5*0.2 = 5.0
        assert_eq!(classify(8000, 2_500_000), Rarity::Legendary);
        // 1*0.8 + 2*0.2 = 1.2
        assert_eq!(classify(100, 50_000), Rarity::Common);
    }

    #[test]
    fn classify_boundaries() {
        // 5*0.8 + 3*0.2 = 4.6
        assert_eq!(classify(7000, 500_000), Rarity::Legendary);
        // 5*0.8 + 1*0.2 = 4.2
        assert_eq!(classify(9000, 0), Rarity::Epic);
        // 4*0.8 + 2*0.2 = 3.6
        assert_eq!(classify(3000, 100_000), Rarity::Epic);
        // 4*0.8 + 1*0.2 = 3.4
        assert_eq!(classify(3000, 0), Rarity::Rare);
        // 3*0.8 + 1*0.2 = 2.6
        assert_eq!(classify(800, 0), Rarity::Rare);
        // 2*0.8 + 1*0.2 = 1.8
        assert_eq!(classify(150, 0), Rarity::Uncommon);
        // 1*0.8 + 5*0.2 = 1.8
        assert_eq!(classify(0, 3_000_000), Rarity::Uncommon);
        // 1*0.8 + 1*0.2 = 1.0
        assert_eq!(classify(0, 0), Rarity::Common);
    }

    #[test]
    fn classify_is_deterministic() {
        for favorites in [0, 149, 150, 799, 800, 2999, 3000, 6999, 7000, 50_000] {
            for popularity in [0, 99_999, 100_000, 500_000, 1_000_000, 2_000_000] {
                assert_eq!(
                    classify(favorites, popularity),
                    classify(favorites, popularity)
                );
            }
        }
    }

    #[test]
    fn rarity_parsing_is_case_insensitive() {
        assert_eq!("LEGENDARY".parse::<Rarity>().unwrap(), Rarity::Legendary);
        assert_eq!(" epic ".parse::<Rarity>().unwrap(), Rarity::Epic);
        assert!("mythic".parse::<Rarity>().is_err());
    }

    #[test]
    fn rarity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Rarity::Uncommon).unwrap(), "\"uncommon\"");
        for tier in Rarity::FALLBACK_ORDER {
            assert_eq!(Rarity::FALLBACK_ORDER[tier.index()], tier);
        }
    }
}
