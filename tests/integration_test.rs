use serde_json::json;
use std::collections::HashSet;

use ledgerlens::actions::{Action, Outcome};
use ledgerlens::client::{load_tokens_for, ExtractedDocument};
use ledgerlens::config::ViewConfig;
use ledgerlens::export::corrected_artifact_path;
use ledgerlens::overlay::TokenState;
use ledgerlens::raster::{rasterize, save_png};
use ledgerlens::table::{CellRef, ColumnKey};
use ledgerlens::tokens::TokenIndex;
use ledgerlens::Session;

const ACCOUNT0: CellRef = CellRef {
    row: 0,
    column: ColumnKey::Account,
};

/// Surface the size of the default page, so logical == document coordinates
fn view_config() -> ViewConfig {
    ViewConfig {
        surface_width: 595.0,
        surface_height: 842.0,
        ..ViewConfig::default()
    }
}

fn two_token_session() -> Session {
    let document = ExtractedDocument::from_response(&json!({
        "documentId": "doc-42",
        "images": ["pages/p0.png"],
        "data": [
            { "compte": ["401", "1"], "solde_an": ["N/A", null], "solde": ["0", null], "débit": ["0", null], "crédit": ["0", null] }
        ]
    }));
    let tokens = TokenIndex::from_json(
        &json!([
            { "id": 1, "text": "401", "page": 0, "x0": 50.0, "y0": 100.0, "x1": 90.0, "y1": 115.0 },
            { "id": 2, "text": "411000", "page": 0, "x0": 200.0, "y0": 100.0, "x1": 260.0, "y1": 115.0 }
        ])
        .to_string(),
    )
    .unwrap();
    Session::new(document, tokens, &view_config()).with_original_filename("bilan")
}

fn assert_index_matches_scan(session: &Session) {
    let cached: HashSet<String> = session.table().bound_token_ids().map(str::to_string).collect();
    let scanned: Vec<String> = session.table().scan_bound_ids();
    assert_eq!(scanned.len(), cached.len(), "a token is bound twice: {:?}", scanned);
    assert_eq!(cached, scanned.into_iter().collect::<HashSet<_>>());
}

#[test]
fn test_pick_rebinds_and_releases_prior_token() {
    let mut session = two_token_session();

    assert_eq!(session.update(Action::SelectCell(ACCOUNT0)), Outcome::Redraw);
    assert_eq!(session.update(Action::PointerPick { x: 230.0, y: 107.0 }), Outcome::Redraw);

    let cell = session.table().cell(ACCOUNT0).unwrap();
    assert_eq!(cell.value, "411000");
    assert_eq!(cell.token_id.as_deref(), Some("2"));
    assert!(!session.table().is_bound("1"));
    assert_index_matches_scan(&session);
}

#[test]
fn test_steal_and_release_between_rows() {
    let document = ExtractedDocument::from_response(&json!([
        { "documentId": "d", "compte": ["401", "1"] },
        { "compte": ["512", null], "débit": ["40", "2"] }
    ]));
    let tokens = TokenIndex::from_json(
        &json!([
            { "id": "1", "text": "401", "page": 0, "x0": 10, "y0": 10, "x1": 40, "y1": 20 },
            { "id": "2", "text": "40", "page": 0, "x0": 100, "y0": 10, "x1": 140, "y1": 20 }
        ])
        .to_string(),
    )
    .unwrap();
    let mut session = Session::new(document, tokens, &view_config());

    let account1 = CellRef::new(1, ColumnKey::Account);
    let debit1 = CellRef::new(1, ColumnKey::Debit);

    // Token "1" moves from row 0 to row 1
    session.update(Action::SelectCell(account1));
    session.update(Action::PointerPick { x: 20.0, y: 15.0 });
    assert_eq!(session.table().cell(ACCOUNT0).unwrap().value, "0");
    assert_eq!(session.table().cell(ACCOUNT0).unwrap().token_id, None);
    assert_eq!(session.table().owner_of("1"), Some(account1));
    assert_index_matches_scan(&session);

    // Token "2" moves from debit to account in the same row
    session.update(Action::SelectCell(account1));
    session.update(Action::PointerPick { x: 120.0, y: 15.0 });
    assert_eq!(session.table().cell(debit1).unwrap().value, "0");
    assert_eq!(session.table().owner_of("2"), Some(account1));
    assert!(!session.table().is_bound("1"));
    assert_index_matches_scan(&session);
}

#[test]
fn test_uniqueness_holds_over_a_long_sequence() {
    let mut session = two_token_session();
    let cells = [
        ACCOUNT0,
        CellRef::new(0, ColumnKey::Balance),
        CellRef::new(0, ColumnKey::Debit),
        CellRef::new(0, ColumnKey::Credit),
    ];
    let points = [(70.0, 107.0), (230.0, 107.0), (500.0, 500.0)];

    for step in 0..40 {
        let cell = cells[step % cells.len()];
        let (x, y) = points[(step * 7) % points.len()];
        session.update(Action::SelectCell(cell));
        session.update(Action::PointerPick { x, y });
        if step % 5 == 0 {
            session.update(Action::ActivateCell(cells[(step + 1) % cells.len()]));
        }
        assert_index_matches_scan(&session);
    }
}

#[test]
fn test_visibility_follows_selection() {
    let mut session = two_token_session();

    let frame = session.render(true);
    assert_eq!(frame.drawn_token_ids(), vec!["1"]);

    session.update(Action::SelectCell(CellRef::new(0, ColumnKey::Credit)));
    let frame = session.render(true);
    assert_eq!(frame.drawn_token_ids(), vec!["1", "2"]);
    assert_eq!(frame.highlights[1].state, TokenState::Unassigned);

    // Selecting the bound cell emphasizes its token
    session.update(Action::SelectCell(ACCOUNT0));
    let frame = session.render(true);
    assert_eq!(frame.highlights[0].state, TokenState::Highlighted);
}

#[test]
fn test_balance_check_scenario() {
    let document = ExtractedDocument::from_response(&json!({
        "documentId": "d",
        "data": [
            { "compte": ["1", null], "solde_an": ["100", null], "débit": ["50", null], "crédit": ["20", null], "solde": ["130", null] },
            { "compte": ["2", null], "solde_an": ["100", null], "débit": ["50", null], "crédit": ["20", null], "solde": ["131", null] }
        ]
    }));
    let mut session = Session::new(document, TokenIndex::default(), &view_config());
    session.update(Action::ToggleBalanceCheck);

    let results = session.balance_annotations().unwrap();
    assert!(results[0].valid);
    assert_eq!(results[0].difference(), 0.0);
    assert!(!results[1].valid);
    assert_eq!(results[1].difference(), 1.0);

    // The check never touches the table
    assert_eq!(session.final_data()[1]["solde"], json!(["131", null]));
}

#[test]
fn test_token_file_and_headless_render() {
    let dir = tempfile::tempdir().unwrap();
    let token_dir = dir.path().join("data");
    std::fs::create_dir_all(&token_dir).unwrap();
    std::fs::write(
        token_dir.join("bilan.json"),
        json!([
            { "id": 5, "text": "512", "page": 1, "x0": 10, "y0": 10, "x1": 60, "y1": 30 },
            { "id": 4, "text": "401", "page": 0, "x0": 10, "y0": 10, "x1": 60, "y1": 30 }
        ])
        .to_string(),
    )
    .unwrap();

    let tokens = load_tokens_for(&token_dir, std::path::Path::new("/uploads/bilan.pdf")).unwrap();
    assert_eq!(tokens.page_count(), 2);
    assert_eq!(tokens.tokens_on(1)[0].id, "5");

    let document = ExtractedDocument::from_response(&json!({
        "documentId": "d",
        "images": ["missing0.png", "missing1.png"],
        "data": [{ "compte": ["512", 5] }]
    }));
    let mut session = Session::new(document, tokens, &view_config());
    session.update(Action::ChangePage(1));

    let frame = session.render(true);
    assert_eq!(frame.drawn_token_ids(), vec!["5"]);
    let canvas = rasterize(&frame, None);
    assert_eq!(canvas.dimensions(), (595, 842));

    let placeholder = session.render(false);
    assert!(placeholder.is_placeholder());
    assert!(placeholder.highlights.is_empty());

    let out = dir.path().join("render/page1.png");
    save_png(&canvas, &out).unwrap();
    assert!(out.exists());
    assert!(!corrected_artifact_path(dir.path(), "bilan").exists());
}
