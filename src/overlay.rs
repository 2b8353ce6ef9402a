//! Overlay frame construction.
//!
//! `render_frame` is a pure function of page, tokens, table, selection and
//! surface geometry. It produces a display list that a backend (the raster
//! module for PNG output, the egui painter in the viewer) draws as-is.

use crate::coordinate_mapping::{SurfaceGeometry, SurfaceRect};
use crate::state::SelectionState;
use crate::table::AssignmentTable;
use crate::tokens::{PageSize, Token};

pub const UNAVAILABLE_MESSAGE: &str = "Image unavailable";
pub const DEFAULT_CORNER_RADIUS: f32 = 10.0;

/// Straight (non-premultiplied) color with fractional alpha
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn alpha_u8(&self) -> u8 {
        (self.a.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

pub const EMPHASIS_FILL: Rgba = Rgba::new(255, 215, 0, 0.5);
pub const ASSIGNED_FILL: Rgba = Rgba::new(135, 219, 247, 0.4);
pub const UNASSIGNED_FILL: Rgba = Rgba::new(211, 211, 211, 0.3);
pub const PLACEHOLDER_FILL: Rgba = Rgba::new(240, 240, 240, 1.0);
pub const PLACEHOLDER_TEXT: Rgba = Rgba::new(128, 128, 128, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Highlighted,
    Assigned,
    Unassigned,
}

impl TokenState {
    /// Highlight beats assignment; exactly one state per token per frame
    pub fn classify(token_id: &str, table: &AssignmentTable, selection: &SelectionState) -> Self {
        if selection.highlighted_token() == Some(token_id) {
            TokenState::Highlighted
        } else if table.is_bound(token_id) {
            TokenState::Assigned
        } else {
            TokenState::Unassigned
        }
    }

    pub fn fill(self) -> Rgba {
        match self {
            TokenState::Highlighted => EMPHASIS_FILL,
            TokenState::Assigned => ASSIGNED_FILL,
            TokenState::Unassigned => UNASSIGNED_FILL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenHighlight {
    pub token_id: String,
    pub rect: SurfaceRect,
    pub corner_radius: f32,
    pub state: TokenState,
}

impl TokenHighlight {
    pub fn fill(&self) -> Rgba {
        self.state.fill()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Page image stretched over the whole logical surface
    PageImage { page: usize },
    Placeholder { fill: Rgba, text_color: Rgba, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub page: usize,
    pub geometry: SurfaceGeometry,
    pub background: Background,
    pub highlights: Vec<TokenHighlight>,
}

impl OverlayFrame {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.background, Background::Placeholder { .. })
    }

    pub fn drawn_token_ids(&self) -> Vec<&str> {
        self.highlights.iter().map(|h| h.token_id.as_str()).collect()
    }

    /// Page image requested but not decoded yet: keep the page background,
    /// draw no boxes
    pub fn awaiting_image(mut self) -> Self {
        self.highlights.clear();
        self
    }
}

/// Everything a frame is computed from
pub struct FrameInput<'a> {
    pub page: usize,
    pub tokens: &'a [Token],
    pub page_size: PageSize,
    pub table: &'a AssignmentTable,
    pub selection: &'a SelectionState,
    pub geometry: SurfaceGeometry,
    pub image_available: bool,
    pub corner_radius: f32,
}

/// Radius never exceeds half the smaller side of the rectangle
pub fn effective_radius(rect: &SurfaceRect, radius: f32) -> f32 {
    radius
        .min(rect.width().abs() / 2.0)
        .min(rect.height().abs() / 2.0)
        .max(0.0)
}

/// With a cell selected every token is a pick candidate, otherwise only
/// current assignments are shown
pub fn is_visible(token: &Token, table: &AssignmentTable, selection: &SelectionState) -> bool {
    selection.has_selection() || table.is_bound(&token.id)
}

pub fn render_frame(input: FrameInput<'_>) -> OverlayFrame {
    if !input.image_available {
        tracing::debug!("Page {} image unavailable, drawing placeholder", input.page);
        return OverlayFrame {
            page: input.page,
            geometry: input.geometry,
            background: Background::Placeholder {
                fill: PLACEHOLDER_FILL,
                text_color: PLACEHOLDER_TEXT,
                message: UNAVAILABLE_MESSAGE.to_string(),
            },
            highlights: Vec::new(),
        };
    }

    let highlights: Vec<TokenHighlight> = input
        .tokens
        .iter()
        .filter(|token| is_visible(token, input.table, input.selection))
        .map(|token| {
            let rect = input.geometry.project(&token.bbox, input.page_size);
            TokenHighlight {
                token_id: token.id.clone(),
                corner_radius: effective_radius(&rect, input.corner_radius),
                rect,
                state: TokenState::classify(&token.id, input.table, input.selection),
            }
        })
        .collect();

    tracing::trace!(
        "Frame for page {}: {} of {} tokens drawn",
        input.page,
        highlights.len(),
        input.tokens.len()
    );

    OverlayFrame {
        page: input.page,
        geometry: input.geometry,
        background: Background::PageImage { page: input.page },
        highlights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CellRef, ColumnKey};
    use crate::tokens::BBox;
    use serde_json::json;

    fn tokens() -> Vec<Token> {
        ["5", "6", "7"]
            .iter()
            .enumerate()
            .map(|(i, id)| Token {
                id: id.to_string(),
                text: format!("text{}", id),
                page: 0,
                bbox: BBox::new(10.0 + 50.0 * i as f32, 10.0, 40.0 + 50.0 * i as f32, 20.0),
            })
            .collect()
    }

    fn table() -> AssignmentTable {
        AssignmentTable::from_wire(&json!([{ "compte": ["text7", "7"] }]))
    }

    fn frame(tokens: &[Token], table: &AssignmentTable, selection: &SelectionState, image: bool) -> OverlayFrame {
        render_frame(FrameInput {
            page: 0,
            tokens,
            page_size: PageSize::default(),
            table,
            selection,
            geometry: SurfaceGeometry::new(595.0, 842.0, 1.0, 1.0),
            image_available: image,
            corner_radius: DEFAULT_CORNER_RADIUS,
        })
    }

    #[test]
    fn test_no_boxes_while_image_loads() {
        let tokens = tokens();
        let table = table();
        let mut selection = SelectionState::default();
        selection.select(CellRef::new(0, ColumnKey::Debit));

        let loading = frame(&tokens, &table, &selection, true).awaiting_image();
        assert!(!loading.is_placeholder());
        assert!(loading.drawn_token_ids().is_empty());
    }

    #[test]
    fn test_only_bound_tokens_without_selection() {
        let tokens = tokens();
        let table = table();
        let result = frame(&tokens, &table, &SelectionState::default(), true);
        assert_eq!(result.drawn_token_ids(), vec!["7"]);
        assert_eq!(result.highlights[0].state, TokenState::Assigned);
    }

    #[test]
    fn test_all_tokens_with_selection() {
        let tokens = tokens();
        let table = table();
        let mut selection = SelectionState::default();
        selection.select(CellRef::new(0, ColumnKey::Debit));

        let result = frame(&tokens, &table, &selection, true);
        assert_eq!(result.drawn_token_ids(), vec!["5", "6", "7"]);
        assert_eq!(result.highlights[0].fill(), UNASSIGNED_FILL);
        assert_eq!(result.highlights[2].fill(), ASSIGNED_FILL);
    }

    #[test]
    fn test_highlight_takes_priority_over_assignment() {
        let tokens = tokens();
        let table = table();
        let mut selection = SelectionState::default();
        selection.set_highlight(Some("7".into()));

        let result = frame(&tokens, &table, &selection, true);
        assert_eq!(result.highlights.len(), 1);
        assert_eq!(result.highlights[0].state, TokenState::Highlighted);
        assert_eq!(result.highlights[0].fill(), EMPHASIS_FILL);
    }

    #[test]
    fn test_missing_image_skips_overlays() {
        let tokens = tokens();
        let table = table();
        let mut selection = SelectionState::default();
        selection.select(CellRef::new(0, ColumnKey::Account));

        let result = frame(&tokens, &table, &selection, false);
        assert!(result.is_placeholder());
        assert!(result.highlights.is_empty());
    }

    #[test]
    fn test_radius_clamped_to_small_boxes() {
        let rect = SurfaceRect { left: 0.0, top: 0.0, right: 30.0, bottom: 8.0 };
        assert_eq!(effective_radius(&rect, 10.0), 4.0);
        let big = SurfaceRect { left: 0.0, top: 0.0, right: 100.0, bottom: 100.0 };
        assert_eq!(effective_radius(&big, 10.0), 10.0);
    }
}
