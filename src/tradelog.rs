//! Append-only trade log.
//!
//! One JSON object per line. Appending a record never rewrites earlier
//! lines, so a crash mid-write loses at most the record being written and
//! the file doubles as a tailable audit stream.

use crate::errors::Result;
use crate::submitter::TradeResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct TradeRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub token_a: &'a str,
    pub token_b: &'a str,
    #[serde(flatten)]
    pub result: &'a TradeResult,
}

pub struct TradeLog {
    path: PathBuf,
}

impl TradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, result: &TradeResult) -> Result<()> {
        let record = TradeRecord {
            timestamp: Utc::now(),
            token_a: &result.opportunity.pair.token_a,
            token_b: &result.opportunity.pair.token_b,
            result,
        };
        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        debug!(path = %self.path.display(), "trade record appended");
        Ok(())
    }
}
