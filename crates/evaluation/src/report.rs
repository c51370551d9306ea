//! Tab-separated per-user result report.

use std::io::Write;

use recommender::Recommendation;

use crate::error::Result;
use crate::scoring::UserScore;

pub const REPORT_HEADER: &str = "UserID\tN_Correct\tPrecisionAt2\tPrecisionAt4\tPrecisionAt6\tPrecisionAt20\tPrecisionAt30\tRecall\tRecommendedItems";

/// Writes one row per evaluated user after the header
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> ReportWriter<W> {
    /// Wrap `out` and write the header line
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{}", REPORT_HEADER)?;
        Ok(Self { out, rows: 0 })
    }

    /// Append a row; items are written as `id:weight`, comma separated,
    /// with weights to three decimals like the score columns
    pub fn write_row(&mut self, score: &UserScore, recommendations: &[Recommendation]) -> Result<()> {
        let items = recommendations
            .iter()
            .map(|r| format!("{}:{:.3}", r.item_id, r.weight))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            self.out,
            "{}\t{}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{}",
            score.user_id,
            score.n_correct,
            score.precision_at_2,
            score.precision_at_4,
            score.precision_at_6,
            score.precision_at_20,
            score.precision_at_30,
            score.recall,
            items
        )?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
