pub mod assignment;
pub mod balance;
pub mod cell;

pub use assignment::{AssignmentTable, Row, SetOutcome};
pub use balance::{annotate, RowBalance};
pub use cell::{Cell, CellRef, ColumnKey};
