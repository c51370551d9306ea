//! Export of the interaction log joined with user and item attributes.
//!
//! One tab-separated row per logged interaction, latest first. Used to
//! hand the training data to offline tooling.

use std::io::Write;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::index::DataIndex;

pub const JOINED_HEADER: &str = "user_id\titem_id\tinteraction_type\t\
user_career_level\titem_career_level\t\
user_discipline_id\titem_discipline_id\t\
user_industry_id\titem_industry_id\t\
user_country\titem_country\t\
user_region\titem_region\t\
created_at";

/// Write every logged interaction joined with both profiles.
///
/// Returns the number of rows written, header excluded.
#[instrument(skip_all)]
pub fn write_joined_interactions<W: Write>(index: &DataIndex, mut out: W) -> Result<usize> {
    writeln!(out, "{}", JOINED_HEADER)?;

    let mut rows = 0;
    for record in index.interactions().sorted_by_time() {
        // Records only enter the log after both ends were resolved
        let (Some(user), Some(item)) = (index.get_user(record.user_id), index.get_item(record.item_id))
        else {
            continue;
        };
        let (u, i) = (&user.profile, &item.profile);
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.user_id,
            record.item_id,
            record.kind.code(),
            u.career_level,
            i.career_level,
            u.discipline_id,
            i.discipline_id,
            u.industry_id,
            i.industry_id,
            u.country,
            i.country,
            u.region,
            i.region,
            record.timestamp,
        )?;
        rows += 1;
    }
    out.flush()?;

    debug!(rows, "joined interactions written");
    Ok(rows)
}
