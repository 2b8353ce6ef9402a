use crate::table::CellRef;

/// Single global focus plus the emphasized token.
/// `highlighted_token` is independent of the selection and survives it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: Option<CellRef>,
    highlighted_token: Option<String>,
}

impl SelectionState {
    pub fn selected(&self) -> Option<CellRef> {
        self.selected
    }

    pub fn is_selected(&self, at: CellRef) -> bool {
        self.selected == Some(at)
    }

    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }

    /// Focus a cell; any previous selection is dropped
    pub fn select(&mut self, at: CellRef) -> Option<CellRef> {
        self.selected.replace(at)
    }

    pub fn clear(&mut self) -> Option<CellRef> {
        self.selected.take()
    }

    pub fn highlighted_token(&self) -> Option<&str> {
        self.highlighted_token.as_deref()
    }

    pub fn set_highlight(&mut self, token_id: Option<String>) {
        self.highlighted_token = token_id;
    }
}
