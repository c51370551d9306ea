//! Result types shared by the recommendation algorithms.

use data_loader::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One recommended item with its accumulated weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub weight: f64,
}

impl Recommendation {
    pub fn new(item_id: ItemId, weight: f64) -> Self {
        Self { item_id, weight }
    }
}

/// Written as `item:weight`, the form used in evaluation reports
impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.item_id, self.weight)
    }
}

/// Which collaborative-filtering algorithm to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Items liked by the most similar users
    UserCf,
    /// Items most similar to the ones the user already likes
    ItemCf,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "usercf" | "user" => Ok(Algorithm::UserCf),
            "itemcf" | "item" => Ok(Algorithm::ItemCf),
            other => Err(format!("unknown algorithm '{}' (expected usercf or itemcf)", other)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::UserCf => write!(f, "usercf"),
            Algorithm::ItemCf => write!(f, "itemcf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("usercf".parse::<Algorithm>(), Ok(Algorithm::UserCf));
        assert_eq!("Item-CF".parse::<Algorithm>(), Ok(Algorithm::ItemCf));
        assert_eq!("item_cf".parse::<Algorithm>(), Ok(Algorithm::ItemCf));
        assert!("popular".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::UserCf.to_string(), "usercf");
    }

    #[test]
    fn test_recommendation_display() {
        assert_eq!(Recommendation::new(30, 0.5).to_string(), "30:0.5");
    }
}
