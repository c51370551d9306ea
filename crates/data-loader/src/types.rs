//! Core domain types for the interaction dataset.
//!
//! This module defines the plain data carried by users, items and
//! interaction records. The concurrent parts (interaction tables, interest
//! caches, similar-item lists) live in their own modules and are attached to
//! entities in [`crate::entity`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// Dense numeric identifier of a user
pub type UserId = u32;

/// Dense numeric identifier of an item
pub type ItemId = u32;

/// Seconds since the Unix epoch
pub type Timestamp = i64;

/// A set of small categorical codes (job roles, tags, title tokens, ...)
pub type CodeSet = BTreeSet<u32>;

// =============================================================================
// Interaction Types
// =============================================================================

/// Kind of a user-item interaction.
///
/// The numeric codes match the input files (`0` is reserved as invalid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InteractionType {
    Click = 1,
    Bookmark = 2,
    Reply = 3,
    Delete = 4,
}

impl InteractionType {
    /// Every interaction type, in code order
    pub const ALL: [InteractionType; 4] = [
        InteractionType::Click,
        InteractionType::Bookmark,
        InteractionType::Reply,
        InteractionType::Delete,
    ];

    /// Types that count as positive feedback (everything except DELETE)
    pub const POSITIVE: [InteractionType; 3] = [
        InteractionType::Click,
        InteractionType::Bookmark,
        InteractionType::Reply,
    ];

    /// Decode a type code from the input files
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(InteractionType::Click),
            2 => Some(InteractionType::Bookmark),
            3 => Some(InteractionType::Reply),
            4 => Some(InteractionType::Delete),
            _ => None,
        }
    }

    /// Numeric code as written in the input files
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Slot of this type inside a per-entity interaction table
    pub(crate) fn slot(self) -> usize {
        self as usize - 1
    }

    pub fn is_positive(self) -> bool {
        self != InteractionType::Delete
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteractionType::Click => "click",
            InteractionType::Bookmark => "bookmark",
            InteractionType::Reply => "reply",
            InteractionType::Delete => "delete",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Interaction Record
// =============================================================================

/// One timestamped user-item interaction.
///
/// Records refer to their user and item by ID only; the owning copies live
/// in the entity stores. A record is shared (`Arc`) between the global
/// interaction log and the two interaction tables it is linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub kind: InteractionType,
    pub timestamp: Timestamp,
}

impl InteractionRecord {
    pub fn new(user_id: UserId, item_id: ItemId, kind: InteractionType, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            item_id,
            kind,
            timestamp,
        }
    }
}

// =============================================================================
// Entity Attributes
// =============================================================================

/// Descriptive attributes of a user.
///
/// None of these take part in the recommendation algorithms; they are kept
/// for inspection and for the joined export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub job_roles: CodeSet,
    /// 0 = unknown .. 6 = senior executive
    pub career_level: u32,
    pub discipline_id: u32,
    pub industry_id: u32,
    pub country: String,
    pub region: u32,
    pub cv_entries: u32,
    pub experience_years: u32,
    pub current_job_years: u32,
    /// 0 = unknown, 1 = bachelor, 2 = master, 3 = phd
    pub edu_degree: u32,
    pub edu_fields: CodeSet,
}

impl UserProfile {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Descriptive attributes of an item (a job posting).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemProfile {
    pub id: ItemId,
    pub title: CodeSet,
    pub career_level: u32,
    pub discipline_id: u32,
    pub industry_id: u32,
    pub country: String,
    pub region: u32,
    pub latitude: f32,
    pub longitude: f32,
    /// 0 = unknown, 1 = full time .. 5 = voluntary
    pub employment_type: u32,
    pub tags: CodeSet,
    /// Interactions earlier than this are rejected at load time
    pub created_at: Timestamp,
    pub active: bool,
}

impl ItemProfile {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

// =============================================================================
// Similarity
// =============================================================================

/// One entry of an item's similar-items list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarItem {
    pub item_id: ItemId,
    pub similarity: f32,
}
