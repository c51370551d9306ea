//! Parser for the tab-separated dataset files.
//!
//! - users.csv: id, job_roles, career_level, discipline_id, industry_id,
//!   country, region, cv_entries, experience_years, current_job_years,
//!   edu_degree, edu_fields
//! - items.csv: id, title, career_level, discipline_id, industry_id,
//!   country, region, latitude, longitude, employment_type, tags,
//!   created_at, active
//! - interactions_*.csv: user_id item_id interaction_type created_at
//!
//! Multi-valued fields are comma-separated integers. The literals `NULL`
//! and `null` stand for the field's default value.
//!
//! Parsing is lenient: a line whose ID can't be read is skipped, any other
//! bad field is logged and defaulted. Only an interaction type outside the
//! declared enum is reported as an error, because it means the input is
//! corrupt rather than merely dirty.

use std::str::FromStr;

use tracing::warn;

use crate::entity::{Item, User};
use crate::error::{DataLoadError, Result};
use crate::types::{CodeSet, InteractionRecord, InteractionType, ItemProfile, UserProfile};

const USERS_FILE: &str = "users.csv";
const ITEMS_FILE: &str = "items.csv";

// Largest valid code of each categorical field
const MAX_CAREER_LEVEL: u32 = 6;
const MAX_REGION: u32 = 16;
const MAX_CV_ENTRIES: u32 = 3;
const MAX_EXPERIENCE_YEARS: u32 = 7;
const MAX_EDU_DEGREE: u32 = 3;
const MAX_EMPLOYMENT_TYPE: u32 = 5;

fn is_null(s: &str) -> bool {
    s == "NULL" || s == "null"
}

/// Parse a single scalar field, mapping NULL to the default value
fn parse_value<T: FromStr + Default>(s: &str) -> Option<T> {
    let s = s.trim();
    if is_null(s) {
        return Some(T::default());
    }
    s.parse().ok()
}

/// Parse a comma-separated list of codes.
///
/// Returns the codes that parsed and whether every token did.
fn parse_code_set(s: &str) -> (CodeSet, bool) {
    let s = s.trim();
    let mut codes = CodeSet::new();
    if s.is_empty() || is_null(s) {
        return (codes, true);
    }
    let mut ok = true;
    for token in s.split(',') {
        match token.trim().parse() {
            Ok(code) => {
                codes.insert(code);
            }
            Err(_) => ok = false,
        }
    }
    (codes, ok)
}

/// Walks the tab-separated fields of one line, logging bad fields
struct Fields<'a> {
    parts: std::str::Split<'a, char>,
    file: &'static str,
    line: usize,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str, file: &'static str, line_no: usize) -> Self {
        Self {
            parts: line.split('\t'),
            file,
            line: line_no,
        }
    }

    fn id(&mut self) -> Option<u32> {
        self.parts.next().and_then(|s| s.trim().parse().ok())
    }

    fn value<T: FromStr + Default>(&mut self, name: &str) -> T {
        match self.parts.next().and_then(parse_value) {
            Some(value) => value,
            None => {
                warn!(file = self.file, line = self.line, "error reading record {}", name);
                T::default()
            }
        }
    }

    fn bounded(&mut self, name: &str, max: u32) -> u32 {
        let value: u32 = self.value(name);
        if value > max {
            warn!(
                file = self.file,
                line = self.line,
                "{} is not a valid {} value",
                value,
                name
            );
        }
        value
    }

    fn codes(&mut self, name: &str) -> CodeSet {
        match self.parts.next() {
            Some(s) => {
                let (codes, ok) = parse_code_set(s);
                if !ok {
                    warn!(file = self.file, line = self.line, "error reading record {}", name);
                }
                codes
            }
            None => {
                warn!(file = self.file, line = self.line, "error reading record {}", name);
                CodeSet::new()
            }
        }
    }

    fn optional_codes(&mut self) -> CodeSet {
        self.parts.next().map(|s| parse_code_set(s).0).unwrap_or_default()
    }

    fn text(&mut self, name: &str) -> String {
        match self.parts.next() {
            Some(s) if is_null(s.trim()) => String::new(),
            Some(s) => s.trim().to_string(),
            None => {
                warn!(file = self.file, line = self.line, "error reading record {}", name);
                String::new()
            }
        }
    }
}

/// Parse one line of users.csv.
///
/// Returns `None` when the ID can't be read (blank or garbage line).
pub fn parse_user_line(line: &str, line_no: usize) -> Option<User> {
    let mut fields = Fields::new(line, USERS_FILE, line_no);
    let id = fields.id()?;

    let profile = UserProfile {
        id,
        job_roles: fields.codes("job_roles"),
        career_level: fields.bounded("career_level", MAX_CAREER_LEVEL),
        discipline_id: fields.value("discipline_id"),
        industry_id: fields.value("industry_id"),
        country: fields.text("country"),
        region: fields.bounded("region", MAX_REGION),
        cv_entries: fields.bounded("cv_entries", MAX_CV_ENTRIES),
        experience_years: fields.bounded("experience_years", MAX_EXPERIENCE_YEARS),
        current_job_years: fields.bounded("current_job_years", MAX_EXPERIENCE_YEARS),
        edu_degree: fields.bounded("edu_degree", MAX_EDU_DEGREE),
        // May be empty when edu_degree is 0
        edu_fields: fields.optional_codes(),
    };
    Some(User::new(profile))
}

/// Parse one line of items.csv.
///
/// Returns `None` when the ID can't be read (blank or garbage line).
pub fn parse_item_line(line: &str, line_no: usize) -> Option<Item> {
    let mut fields = Fields::new(line, ITEMS_FILE, line_no);
    let id = fields.id()?;

    let profile = ItemProfile {
        id,
        title: fields.codes("title"),
        career_level: fields.bounded("career_level", MAX_CAREER_LEVEL),
        discipline_id: fields.value("discipline_id"),
        industry_id: fields.value("industry_id"),
        country: fields.text("country"),
        region: fields.bounded("region", MAX_REGION),
        latitude: fields.value("latitude"),
        longitude: fields.value("longitude"),
        employment_type: fields.bounded("employment_type", MAX_EMPLOYMENT_TYPE),
        tags: fields.codes("tags"),
        created_at: fields.value("created_at"),
        active: fields.value::<i32>("active") != 0,
    };
    Some(Item::new(profile))
}

/// Parse one interaction line: `user_id item_id type timestamp`.
///
/// Blank lines yield `Ok(None)`; so do lines with unreadable numbers, after
/// a warning. A type code outside CLICK..DELETE is an error.
pub fn parse_interaction_line(line: &str, line_no: usize) -> Result<Option<InteractionRecord>> {
    let mut parts = line.split_whitespace();
    let Some(first) = parts.next() else {
        return Ok(None);
    };

    let parsed = (|| {
        let user_id: u32 = first.parse().ok()?;
        let item_id: u32 = parts.next()?.parse().ok()?;
        let code: u32 = parts.next()?.parse().ok()?;
        let timestamp: i64 = parts.next()?.parse().ok()?;
        Some((user_id, item_id, code, timestamp))
    })();

    let Some((user_id, item_id, code, timestamp)) = parsed else {
        warn!(line = line_no, "malformed interaction record skipped");
        return Ok(None);
    };

    let kind = InteractionType::from_code(code)
        .ok_or(DataLoadError::InvalidInteractionType { code, line: line_no })?;
    Ok(Some(InteractionRecord::new(user_id, item_id, kind, timestamp)))
}
