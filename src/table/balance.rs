//! Row balance check: `opening + debit - credit` against the stored balance.

use regex::Regex;
use std::sync::OnceLock;

use super::assignment::AssignmentTable;
use super::cell::ColumnKey;

/// Absolute tolerance for rounding differences
pub const BALANCE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowBalance {
    pub row: usize,
    pub computed: f64,
    pub stored: f64,
    pub valid: bool,
}

impl RowBalance {
    pub fn difference(&self) -> f64 {
        (self.computed - self.stored).abs()
    }
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // "1 234 567,89", "1234.5", "-12,00", "12,00-"
    PATTERN.get_or_init(|| {
        Regex::new(r"^(-)?(\d{1,3}(?:[ \u{a0}\u{202f}]\d{3})+|\d+)(?:[.,](\d+))?(-)?$")
            .expect("amount pattern is valid")
    })
}

/// Parse an amount as printed in the statements. Unparseable text is `None`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let caps = amount_pattern().captures(trimmed)?;

    let integer: String = caps[2].chars().filter(|c| c.is_ascii_digit()).collect();
    let number = match caps.get(3) {
        Some(fraction) => format!("{}.{}", integer, fraction.as_str()),
        None => integer,
    };
    let value: f64 = number.parse().ok()?;

    let negative = caps.get(1).is_some() || caps.get(4).is_some();
    Some(if negative { -value } else { value })
}

/// Amount of a cell for the balance formula; unreadable values count as 0
fn cell_amount(table: &AssignmentTable, row: usize, column: ColumnKey) -> f64 {
    let Some(cell) = table.rows().get(row).map(|r| r.cell(column)) else {
        return 0.0;
    };
    if column == ColumnKey::OpeningBalance && cell.value.trim() == "N/A" {
        return 0.0;
    }
    parse_amount(&cell.value).unwrap_or(0.0)
}

pub fn check_row(table: &AssignmentTable, row: usize) -> RowBalance {
    let opening = cell_amount(table, row, ColumnKey::OpeningBalance);
    let debit = cell_amount(table, row, ColumnKey::Debit);
    let credit = cell_amount(table, row, ColumnKey::Credit);
    let stored = cell_amount(table, row, ColumnKey::Balance);

    let computed = opening + debit - credit;
    RowBalance {
        row,
        computed,
        stored,
        valid: (computed - stored).abs() < BALANCE_TOLERANCE,
    }
}

/// Classify every row. Pure: reads the table, never changes it.
pub fn annotate(table: &AssignmentTable) -> Vec<RowBalance> {
    (0..table.row_count()).map(|row| check_row(table, row)).collect()
}
