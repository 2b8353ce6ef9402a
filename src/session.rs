//! One open document: tokens, table, selection and view, plus the
//! interaction controller that turns user actions into table mutations.

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actions::{Action, Outcome, NOTICE_NO_TOKEN_FOR_CELL, NOTICE_SELECT_CELL_FIRST};
use crate::client::ExtractedDocument;
use crate::config::ViewConfig;
use crate::coordinate_mapping::{hit_test, SurfaceGeometry};
use crate::error::{LedgerError, LedgerResult};
use crate::overlay::{render_frame, FrameInput, OverlayFrame};
use crate::state::{CorrectionJournal, CorrectionKind, SelectionState, ViewState};
use crate::table::{annotate, AssignmentTable, CellRef, RowBalance};
use crate::tokens::TokenIndex;

pub struct Session {
    id: Uuid,
    document_id: Option<String>,
    /// Base name of the uploaded file, used for the corrected artifact
    original_filename: Option<String>,
    images: Vec<String>,
    tokens: TokenIndex,
    table: AssignmentTable,
    selection: SelectionState,
    view: ViewState,
    balance_check: bool,
    journal: CorrectionJournal,
    surface_width: f32,
    surface_height: f32,
    device_pixel_ratio: f32,
    corner_radius: f32,
}

impl Session {
    pub fn new(document: ExtractedDocument, mut tokens: TokenIndex, config: &ViewConfig) -> Self {
        let page_count = document.images.len();
        tokens.ensure_pages(page_count);

        let mut view = ViewState::from_config(config);
        view.set_page_count(page_count);

        let session = Self {
            id: Uuid::new_v4(),
            document_id: document.document_id,
            original_filename: None,
            images: document.images,
            tokens,
            table: document.table,
            selection: SelectionState::default(),
            view,
            balance_check: false,
            journal: CorrectionJournal::default(),
            surface_width: config.surface_width,
            surface_height: config.surface_height,
            device_pixel_ratio: config.device_pixel_ratio,
            corner_radius: config.corner_radius,
        };

        info!(
            session = %session.id,
            "Session opened: {} rows, {} tokens, {} pages",
            session.table.row_count(),
            session.tokens.len(),
            page_count
        );
        session
    }

    pub fn with_original_filename(mut self, stem: impl Into<String>) -> Self {
        self.original_filename = Some(stem.into());
        self
    }

    /// Pure state transition; errors become user notices
    pub fn update(&mut self, action: Action) -> Outcome {
        debug!(session = %self.id, "Action: {:?}", action);
        let result = match action {
            Action::SelectCell(at) => self.select_cell(at),
            Action::ActivateCell(at) => self.activate_cell(at),
            Action::EditValue(at, text) => self.edit_value(at, &text),
            Action::HighlightCell(at) => self.highlight_cell(at),
            Action::ClearSelection => Ok(match self.selection.clear() {
                Some(_) => Outcome::Redraw,
                None => Outcome::Unchanged,
            }),
            Action::PointerPick { x, y } => self.pointer_pick(x, y),
            Action::Zoom(direction) => Ok(if self.view.zoom(direction) {
                info!("Zoom: {:.0}%", self.view.zoom_level * 100.0);
                Outcome::Redraw
            } else {
                Outcome::Unchanged
            }),
            Action::ChangePage(page) => Ok(if self.view.go_to_page(page) {
                Outcome::Redraw
            } else {
                Outcome::Unchanged
            }),
            Action::ToggleBalanceCheck => {
                self.balance_check = !self.balance_check;
                Ok(Outcome::Redraw)
            }
        };

        result.unwrap_or_else(|err| {
            warn!(session = %self.id, "Action rejected: {}", err);
            Outcome::Notice(err.user_message())
        })
    }

    fn select_cell(&mut self, at: CellRef) -> LedgerResult<Outcome> {
        let token = self.existing_cell(at)?.token_id.clone();
        self.selection.select(at);
        self.selection.set_highlight(token);
        Ok(Outcome::Redraw)
    }

    fn activate_cell(&mut self, at: CellRef) -> LedgerResult<Outcome> {
        let released = self.table.clear_cell(at)?;
        self.journal
            .record(CorrectionKind::Clear, at, released, None, at.column.default_value());
        if self.selection.is_selected(at) {
            self.selection.clear();
        }
        Ok(Outcome::Redraw)
    }

    fn edit_value(&mut self, at: CellRef, text: &str) -> LedgerResult<Outcome> {
        self.table.edit_value(at, text)?;
        let cell = self.existing_cell(at)?;
        let (token, value) = (cell.token_id.clone(), cell.value.clone());
        self.journal
            .record(CorrectionKind::Edit, at, token.clone(), token, &value);
        Ok(Outcome::Redraw)
    }

    fn highlight_cell(&mut self, at: CellRef) -> LedgerResult<Outcome> {
        match self.existing_cell(at)?.token_id.clone() {
            Some(token) => {
                self.selection.set_highlight(Some(token));
                Ok(Outcome::Redraw)
            }
            None => Ok(Outcome::Notice(NOTICE_NO_TOKEN_FOR_CELL.to_string())),
        }
    }

    fn pointer_pick(&mut self, x: f32, y: f32) -> LedgerResult<Outcome> {
        let Some(target) = self.selection.selected() else {
            return Ok(Outcome::Notice(NOTICE_SELECT_CELL_FIRST.to_string()));
        };

        let geometry = self.geometry();
        let (logical_x, logical_y) = geometry.pointer_to_logical(x, y);
        let page = self.view.current_page;
        let Some(token) = hit_test(
            self.tokens.tokens_on(page),
            self.tokens.page_size(page),
            &geometry,
            logical_x,
            logical_y,
        )
        .cloned() else {
            debug!("No token at ({:.1}, {:.1}) on page {}", logical_x, logical_y, page);
            return Ok(Outcome::Unchanged);
        };

        let outcome = self.table.set_cell(target, &token.text, Some(token.id.clone()))?;
        if let Some(released) = outcome.released {
            self.journal.record(
                CorrectionKind::Release,
                released,
                Some(token.id.clone()),
                None,
                released.column.default_value(),
            );
        }
        let value = self.existing_cell(target)?.value.clone();
        self.journal.record(
            CorrectionKind::Pick,
            target,
            outcome.previous_token,
            Some(token.id.clone()),
            &value,
        );

        info!("Bound token {} to {}", token.id, target);
        self.selection.set_highlight(Some(token.id));
        self.selection.clear();
        Ok(Outcome::Redraw)
    }

    fn existing_cell(&self, at: CellRef) -> LedgerResult<&crate::table::Cell> {
        self.table
            .cell(at)
            .ok_or_else(|| LedgerError::input(format!("cell {} does not exist", at)))
    }

    /// Surface geometry at the current zoom
    pub fn geometry(&self) -> SurfaceGeometry {
        SurfaceGeometry::new(
            self.surface_width,
            self.surface_height,
            self.device_pixel_ratio,
            self.view.zoom_level,
        )
    }

    pub fn set_surface_size(&mut self, width: f32, height: f32) {
        self.surface_width = width;
        self.surface_height = height;
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.device_pixel_ratio = ratio;
    }

    /// Where a pointer would have to land to hit the centre of `token_id`
    /// on the current page, in surface-reported (zoomed) coordinates
    pub fn pointer_target(&self, token_id: &str) -> Option<(f32, f32)> {
        let page = self.view.current_page;
        let token = self.tokens.tokens_on(page).iter().find(|t| t.id == token_id)?;
        let geometry = self.geometry();
        let rect = geometry.project(&token.bbox, self.tokens.page_size(page));
        let (cx, cy) = ((rect.left + rect.right) / 2.0, (rect.top + rect.bottom) / 2.0);
        Some((cx * geometry.zoom, cy * geometry.zoom))
    }

    /// Frame for the current page
    pub fn render(&self, image_available: bool) -> OverlayFrame {
        let page = self.view.current_page;
        render_frame(FrameInput {
            page,
            tokens: self.tokens.tokens_on(page),
            page_size: self.tokens.page_size(page),
            table: &self.table,
            selection: &self.selection,
            geometry: self.geometry(),
            image_available,
            corner_radius: self.corner_radius,
        })
    }

    /// Row classification while the balance check is on
    pub fn balance_annotations(&self) -> Option<Vec<RowBalance>> {
        self.balance_check.then(|| annotate(&self.table))
    }

    /// Rows in wire shape for `finalData` and the local artifact
    pub fn final_data(&self) -> Value {
        self.table.to_wire()
    }

    pub fn image_reference(&self, page: usize) -> Option<&str> {
        self.images.get(page).map(String::as_str)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }

    pub fn table(&self) -> &AssignmentTable {
        &self.table
    }

    pub fn tokens(&self) -> &TokenIndex {
        &self.tokens
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn page_count(&self) -> usize {
        self.view.page_count
    }

    pub fn balance_check_enabled(&self) -> bool {
        self.balance_check
    }

    pub fn journal(&self) -> &CorrectionJournal {
        &self.journal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ZoomDirection;
    use crate::table::ColumnKey;
    use crate::tokens::{BBox, Token};
    use serde_json::json;

    /// Surface the same size as the page so logical == document coordinates
    fn config() -> ViewConfig {
        ViewConfig {
            surface_width: 595.0,
            surface_height: 842.0,
            ..ViewConfig::default()
        }
    }

    fn token(id: &str, text: &str, x0: f32) -> Token {
        Token {
            id: id.into(),
            text: text.into(),
            page: 0,
            bbox: BBox::new(x0, 100.0, x0 + 50.0, 120.0),
        }
    }

    fn session() -> Session {
        let document = ExtractedDocument {
            document_id: Some("doc".into()),
            images: vec!["p0.png".into()],
            table: AssignmentTable::from_wire(&json!([
                { "compte": ["401", "1"], "débit": ["12", null] },
                { "compte": ["512", null] }
            ])),
        };
        let tokens = TokenIndex::from_tokens(vec![token("1", "401", 10.0), token("2", "411", 100.0)]);
        Session::new(document, tokens, &config())
    }

    const ACCOUNT0: CellRef = CellRef { row: 0, column: ColumnKey::Account };
    const ACCOUNT1: CellRef = CellRef { row: 1, column: ColumnKey::Account };

    #[test]
    fn test_select_sets_highlight_from_binding() {
        let mut s = session();
        assert_eq!(s.update(Action::SelectCell(ACCOUNT0)), Outcome::Redraw);
        assert_eq!(s.selection().highlighted_token(), Some("1"));

        s.update(Action::SelectCell(ACCOUNT1));
        assert!(s.selection().is_selected(ACCOUNT1));
        assert_eq!(s.selection().highlighted_token(), None);
    }

    #[test]
    fn test_pick_while_idle_is_a_notice() {
        let mut s = session();
        let outcome = s.update(Action::PointerPick { x: 110.0, y: 110.0 });
        assert_eq!(outcome.notice(), Some(NOTICE_SELECT_CELL_FIRST));
        assert_eq!(s.table().scan_bound_ids(), vec!["1"]);
    }

    #[test]
    fn test_pick_miss_keeps_selection() {
        let mut s = session();
        s.update(Action::SelectCell(ACCOUNT1));
        assert_eq!(s.update(Action::PointerPick { x: 500.0, y: 500.0 }), Outcome::Unchanged);
        assert!(s.selection().is_selected(ACCOUNT1));
    }

    #[test]
    fn test_pick_binds_and_returns_to_idle() {
        let mut s = session();
        s.update(Action::SelectCell(ACCOUNT1));
        assert_eq!(s.update(Action::PointerPick { x: 110.0, y: 110.0 }), Outcome::Redraw);

        let cell = s.table().cell(ACCOUNT1).unwrap();
        assert_eq!(cell.value, "411");
        assert_eq!(cell.token_id.as_deref(), Some("2"));
        assert!(!s.selection().has_selection());
        assert_eq!(s.selection().highlighted_token(), Some("2"));
        assert_eq!(s.journal().count(CorrectionKind::Pick), 1);
    }

    #[test]
    fn test_pick_accounts_for_zoom() {
        let mut s = session();
        s.update(Action::Zoom(ZoomDirection::In));
        s.update(Action::Zoom(ZoomDirection::In));
        s.update(Action::Zoom(ZoomDirection::In));
        s.update(Action::Zoom(ZoomDirection::In));
        s.update(Action::Zoom(ZoomDirection::In));
        assert!((s.view().zoom_level - 2.0).abs() < 1e-4);

        s.update(Action::SelectCell(ACCOUNT1));
        // token "2" spans x 100..150 logically, 200..300 at zoom 2
        s.update(Action::PointerPick { x: 220.0, y: 220.0 });
        assert_eq!(s.table().cell(ACCOUNT1).unwrap().token_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_steal_is_journaled() {
        let mut s = session();
        s.update(Action::SelectCell(ACCOUNT1));
        s.update(Action::PointerPick { x: 20.0, y: 110.0 });

        assert_eq!(s.table().owner_of("1"), Some(ACCOUNT1));
        assert_eq!(s.table().cell(ACCOUNT0).unwrap().value, "0");
        assert_eq!(s.journal().count(CorrectionKind::Release), 1);
    }

    #[test]
    fn test_double_activation_clears_cell_and_matching_selection() {
        let mut s = session();
        s.update(Action::SelectCell(ACCOUNT1));
        s.update(Action::ActivateCell(ACCOUNT0));
        assert!(s.selection().is_selected(ACCOUNT1));
        assert_eq!(s.table().bound_count(), 0);

        s.update(Action::ActivateCell(ACCOUNT1));
        assert!(!s.selection().has_selection());
    }

    #[test]
    fn test_edit_keeps_binding() {
        let mut s = session();
        s.update(Action::EditValue(ACCOUNT0, "401000".into()));
        let cell = s.table().cell(ACCOUNT0).unwrap();
        assert_eq!(cell.value, "401000");
        assert_eq!(cell.token_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_highlight_unbound_cell_is_a_notice() {
        let mut s = session();
        let outcome = s.update(Action::HighlightCell(ACCOUNT1));
        assert_eq!(outcome.notice(), Some(NOTICE_NO_TOKEN_FOR_CELL));
        assert_eq!(s.update(Action::HighlightCell(ACCOUNT0)), Outcome::Redraw);
        assert_eq!(s.selection().highlighted_token(), Some("1"));
    }

    #[test]
    fn test_out_of_range_cell_is_input_notice() {
        let mut s = session();
        let outcome = s.update(Action::SelectCell(CellRef::new(9, ColumnKey::Credit)));
        assert!(outcome.notice().is_some());
        assert!(!s.selection().has_selection());
    }

    #[test]
    fn test_zoom_and_page_keep_selection() {
        let mut s = session();
        s.update(Action::SelectCell(ACCOUNT1));
        s.update(Action::Zoom(ZoomDirection::Out));
        s.update(Action::ChangePage(0));
        assert!(s.selection().is_selected(ACCOUNT1));
    }

    #[test]
    fn test_balance_toggle() {
        let mut s = session();
        assert!(s.balance_annotations().is_none());
        s.update(Action::ToggleBalanceCheck);
        assert_eq!(s.balance_annotations().unwrap().len(), 2);
    }
}
