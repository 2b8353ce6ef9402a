use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::table::CellRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    Pick,
    /// Prior owner released by a pick elsewhere
    Release,
    Clear,
    Edit,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionRecord {
    pub at: DateTime<Utc>,
    pub kind: CorrectionKind,
    pub row: usize,
    pub column: String,
    pub old_token: Option<String>,
    pub new_token: Option<String>,
    pub value: String,
}

/// Append-only log of committed table mutations
#[derive(Debug, Clone, Default)]
pub struct CorrectionJournal {
    records: Vec<CorrectionRecord>,
}

impl CorrectionJournal {
    pub fn record(
        &mut self,
        kind: CorrectionKind,
        at: CellRef,
        old_token: Option<String>,
        new_token: Option<String>,
        value: &str,
    ) {
        self.records.push(CorrectionRecord {
            at: Utc::now(),
            kind,
            row: at.row,
            column: at.column.wire_key().to_string(),
            old_token,
            new_token,
            value: value.to_string(),
        });
    }

    pub fn records(&self) -> &[CorrectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, kind: CorrectionKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }
}
