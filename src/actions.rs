use crate::state::ZoomDirection;
use crate::table::CellRef;

/// All user interactions that can change a session
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // Table actions
    SelectCell(CellRef),
    /// Double-click on a cell
    ActivateCell(CellRef),
    EditValue(CellRef, String),
    HighlightCell(CellRef),
    ClearSelection,

    // Surface actions
    /// Pointer position as reported by the surface, before zoom compensation
    PointerPick { x: f32, y: f32 },
    Zoom(ZoomDirection),
    ChangePage(usize),

    // View toggles
    ToggleBalanceCheck,
}

/// What the front end should do after an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// State changed, draw a new frame
    Redraw,
    /// Nothing changed; show this to the user
    Notice(String),
    Unchanged,
}

impl Outcome {
    pub fn notice(&self) -> Option<&str> {
        match self {
            Outcome::Notice(message) => Some(message),
            _ => None,
        }
    }
}

pub const NOTICE_SELECT_CELL_FIRST: &str = "Select a cell first";
pub const NOTICE_NO_TOKEN_FOR_CELL: &str = "No token associated with this cell";
