//! The editable grid of cells and the binding invariant: at most one cell
//! references any given token id. The rows are the single source of truth;
//! the token → cell index is a cache rebuilt from them after every mutation.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::cell::{Cell, CellRef, ColumnKey};
use crate::error::{LedgerError, LedgerResult};

/// One table row, one cell per column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    cells: [Cell; 5],
}

impl Row {
    pub fn empty() -> Self {
        Self {
            cells: ColumnKey::ALL.map(Cell::empty),
        }
    }

    pub fn cell(&self, column: ColumnKey) -> &Cell {
        &self.cells[column.index()]
    }

    fn cell_mut(&mut self, column: ColumnKey) -> &mut Cell {
        &mut self.cells[column.index()]
    }

    pub fn cells(&self) -> impl Iterator<Item = (ColumnKey, &Cell)> {
        ColumnKey::ALL.into_iter().zip(self.cells.iter())
    }

    fn from_wire(object: &Map<String, Value>) -> Self {
        let mut row = Self::empty();
        for column in ColumnKey::ALL {
            let raw = object
                .get(column.wire_key())
                .or_else(|| object.iter().find(|(k, _)| ColumnKey::parse(k) == Some(column)).map(|(_, v)| v));
            *row.cell_mut(column) = Cell::from_wire(column, raw);
        }
        row
    }

    fn to_wire(&self) -> Value {
        let mut object = Map::new();
        for (column, cell) in self.cells() {
            object.insert(column.wire_key().to_string(), cell.to_wire());
        }
        Value::Object(object)
    }
}

/// What a `set_cell` changed besides the target
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetOutcome {
    /// Token id the target held before the write
    pub previous_token: Option<String>,
    /// Cell that lost the token to the target (steal-and-release)
    pub released: Option<CellRef>,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentTable {
    rows: Vec<Row>,
    bindings: HashMap<String, CellRef>,
}

impl AssignmentTable {
    pub fn new(rows: Vec<Row>) -> Self {
        let mut table = Self {
            rows,
            bindings: HashMap::new(),
        };
        table.drop_duplicate_bindings();
        table.rebuild_index();
        table
    }

    /// Build the table from the extractor's `data` value.
    /// Non-array data yields an empty table; non-object rows are skipped.
    pub fn from_wire(data: &Value) -> Self {
        let Some(items) = data.as_array() else {
            warn!("Table data is not an array, ignoring it: {}", data);
            return Self::default();
        };

        let mut rows = Vec::with_capacity(items.len());
        for (row_idx, item) in items.iter().enumerate() {
            match item.as_object() {
                Some(object) => rows.push(Row::from_wire(object)),
                None => warn!("Row {} is not an object, skipping: {}", row_idx, item),
            }
        }

        Self::new(rows)
    }

    /// Rows in the extractor's shape, for `finalData` and the local artifact
    pub fn to_wire(&self) -> Value {
        Value::Array(self.rows.iter().map(Row::to_wire).collect())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.rows.get(at.row).map(|row| row.cell(at.column))
    }

    /// Cell currently bound to `token_id`
    pub fn owner_of(&self, token_id: &str) -> Option<CellRef> {
        self.bindings.get(token_id).copied()
    }

    pub fn is_bound(&self, token_id: &str) -> bool {
        self.bindings.contains_key(token_id)
    }

    /// The derived set of claimed token ids
    pub fn bound_token_ids(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }

    /// Replace a cell's value and binding. If `token_id` is held by another
    /// cell, that cell is reset to its column default first.
    pub fn set_cell(&mut self, at: CellRef, value: &str, token_id: Option<String>) -> LedgerResult<SetOutcome> {
        self.check_row(at)?;

        let mut outcome = SetOutcome {
            previous_token: self.rows[at.row].cell(at.column).token_id.clone(),
            released: None,
        };

        if let Some(id) = token_id.as_deref() {
            if let Some(owner) = self.owner_of(id).filter(|owner| *owner != at) {
                *self.rows[owner.row].cell_mut(owner.column) = Cell::empty(owner.column);
                debug!("Released token {} from {}", id, owner);
                outcome.released = Some(owner);
            }
        }

        let value = if value.trim().is_empty() {
            at.column.default_value()
        } else {
            value
        };
        *self.rows[at.row].cell_mut(at.column) = Cell::new(value, token_id);

        self.rebuild_index();
        Ok(outcome)
    }

    /// Reset a cell to its column default, returning the token it released
    pub fn clear_cell(&mut self, at: CellRef) -> LedgerResult<Option<String>> {
        self.check_row(at)?;
        let released = std::mem::replace(self.rows[at.row].cell_mut(at.column), Cell::empty(at.column)).token_id;
        self.rebuild_index();
        Ok(released)
    }

    /// Replace the displayed text only; the binding stays as it is
    pub fn edit_value(&mut self, at: CellRef, value: &str) -> LedgerResult<()> {
        self.check_row(at)?;
        let token_id = self.rows[at.row].cell(at.column).token_id.clone();
        self.set_cell(at, value, token_id).map(|_| ())
    }

    /// Fresh scan of every cell, independent of the cached index
    pub fn scan_bound_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .rows
            .iter()
            .flat_map(|row| row.cells.iter().filter_map(|c| c.token_id.clone()))
            .collect();
        ids.sort();
        ids
    }

    fn check_row(&self, at: CellRef) -> LedgerResult<()> {
        if at.row >= self.rows.len() {
            return Err(LedgerError::input(format!(
                "row {} does not exist (table has {} rows)",
                at.row,
                self.rows.len()
            )));
        }
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.bindings.clear();
        for (row_idx, row) in self.rows.iter().enumerate() {
            for (column, cell) in row.cells() {
                if let Some(id) = &cell.token_id {
                    self.bindings.insert(id.clone(), CellRef::new(row_idx, column));
                }
            }
        }
    }

    /// Extracted data may reference one token from several cells; the first
    /// cell in row order keeps it, later cells keep their text unbound.
    fn drop_duplicate_bindings(&mut self) {
        let mut seen: HashMap<String, CellRef> = HashMap::new();
        for (row_idx, row) in self.rows.iter_mut().enumerate() {
            for column in ColumnKey::ALL {
                let cell = row.cell_mut(column);
                let Some(id) = cell.token_id.clone() else {
                    continue;
                };
                if let Some(first) = seen.get(&id) {
                    warn!(
                        "Token {} already bound to {}, unbinding row {} / {}",
                        id, first, row_idx, column
                    );
                    cell.token_id = None;
                } else {
                    seen.insert(id, CellRef::new(row_idx, column));
                }
            }
        }
    }
}
