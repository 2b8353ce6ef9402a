use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The five columns of a balance table, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnKey {
    #[serde(rename = "compte", alias = "account")]
    Account,
    #[serde(rename = "solde_an", alias = "openingBalance")]
    OpeningBalance,
    #[serde(rename = "solde", alias = "balance")]
    Balance,
    #[serde(rename = "débit", alias = "debit")]
    Debit,
    #[serde(rename = "crédit", alias = "credit")]
    Credit,
}

impl ColumnKey {
    pub const ALL: [ColumnKey; 5] = [
        ColumnKey::Account,
        ColumnKey::OpeningBalance,
        ColumnKey::Balance,
        ColumnKey::Debit,
        ColumnKey::Credit,
    ];

    /// Position in display order
    pub fn index(self) -> usize {
        match self {
            ColumnKey::Account => 0,
            ColumnKey::OpeningBalance => 1,
            ColumnKey::Balance => 2,
            ColumnKey::Debit => 3,
            ColumnKey::Credit => 4,
        }
    }

    /// Key used by the extraction backend
    pub fn wire_key(self) -> &'static str {
        match self {
            ColumnKey::Account => "compte",
            ColumnKey::OpeningBalance => "solde_an",
            ColumnKey::Balance => "solde",
            ColumnKey::Debit => "débit",
            ColumnKey::Credit => "crédit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColumnKey::Account => "Account",
            ColumnKey::OpeningBalance => "Opening balance",
            ColumnKey::Balance => "Balance",
            ColumnKey::Debit => "Debit",
            ColumnKey::Credit => "Credit",
        }
    }

    /// Value a cell falls back to when cleared or malformed
    pub fn default_value(self) -> &'static str {
        match self {
            ColumnKey::OpeningBalance => "N/A",
            _ => "0",
        }
    }

    /// Accepts both the wire keys and the English names
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "compte" | "account" => Some(ColumnKey::Account),
            "solde_an" | "openingBalance" | "opening_balance" => Some(ColumnKey::OpeningBalance),
            "solde" | "balance" => Some(ColumnKey::Balance),
            "débit" | "debit" => Some(ColumnKey::Debit),
            "crédit" | "credit" => Some(ColumnKey::Credit),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

impl std::str::FromStr for ColumnKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown column '{}'", s))
    }
}

/// Address of one cell in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: usize,
    pub column: ColumnKey,
}

impl CellRef {
    pub fn new(row: usize, column: ColumnKey) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} / {}", self.row, self.column)
    }
}

/// One table field: displayed text plus an optional binding to a token id.
/// The token id is a weak reference; the token index owns the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub value: String,
    pub token_id: Option<String>,
}

impl Cell {
    pub fn new(value: impl Into<String>, token_id: Option<String>) -> Self {
        Self {
            value: value.into(),
            token_id,
        }
    }

    pub fn empty(column: ColumnKey) -> Self {
        Self::new(column.default_value(), None)
    }

    /// Normalize a wire cell `[displayValue, tokenId]`.
    /// Anything that is not an array of at least two entries becomes the default.
    pub fn from_wire(column: ColumnKey, raw: Option<&Value>) -> Self {
        let Some(Value::Array(parts)) = raw else {
            return Self::empty(column);
        };
        if parts.len() < 2 {
            return Self::empty(column);
        }

        let value = match &parts[0] {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => column.default_value().to_string(),
        };
        let token_id = match &parts[1] {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };

        Self { value, token_id }
    }

    pub fn to_wire(&self) -> Value {
        Value::Array(vec![
            Value::String(self.value.clone()),
            self.token_id
                .as_ref()
                .map(|id| Value::String(id.clone()))
                .unwrap_or(Value::Null),
        ])
    }

    pub fn is_bound(&self) -> bool {
        self.token_id.is_some()
    }
}
