use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::actions::{Action, Outcome};
use crate::client::{document_stem, load_tokens_for, ExtractedDocument, ExtractionClient};
use crate::config::LedgerConfig;
use crate::export::save_session;
use crate::image_loader::ImageLoader;
use crate::raster::{rasterize, save_png};
use crate::session::Session;
use crate::state::ZoomDirection;
use crate::table::{annotate, CellRef, ColumnKey};
use crate::tokens::TokenIndex;

/// `ROW:COLUMN`, column by wire key or English name (`0:compte`, `2:debit`)
pub fn parse_cell(text: &str) -> Result<CellRef, String> {
    let (row, column) = text
        .split_once(':')
        .ok_or_else(|| format!("expected ROW:COLUMN, got '{}'", text))?;
    let row = row
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid row '{}'", row))?;
    let column = ColumnKey::parse(column.trim()).ok_or_else(|| format!("unknown column '{}'", column))?;
    Ok(CellRef::new(row, column))
}

/// `ROW:COLUMN=TOKEN`
pub fn parse_binding(text: &str) -> Result<(CellRef, String), String> {
    let (cell, token) = text
        .split_once('=')
        .ok_or_else(|| format!("expected ROW:COLUMN=TOKEN, got '{}'", text))?;
    Ok((parse_cell(cell)?, token.trim().to_string()))
}

/// Snapshot plus token file for a source document
pub fn open_session(
    config: &LedgerConfig,
    document: &Path,
    tokens: Option<&Path>,
    source_name: Option<&str>,
) -> Result<Session> {
    let extracted = ExtractedDocument::load_from_file(document)
        .with_context(|| format!("loading extraction snapshot {}", document.display()))?;

    let stem = source_name
        .map(|name| document_stem(Path::new(name)))
        .unwrap_or_else(|| document_stem(document).trim_end_matches("_extraction").to_string());

    let token_index = match tokens {
        Some(path) => TokenIndex::load_from_file(path)?,
        None => match load_tokens_for(&config.paths.token_dir, Path::new(&stem)) {
            Ok(index) => index,
            Err(err) => {
                warn!("No token file for {}: {}", stem, err.user_message());
                TokenIndex::default()
            }
        },
    };

    Ok(Session::new(extracted, token_index, &config.view).with_original_filename(stem))
}

/// Upload a document and store the extraction snapshot
pub async fn extract_command(config: &LedgerConfig, file: PathBuf, output: Option<PathBuf>) -> Result<()> {
    info!("🔍 Extracting {}", file.display());
    let client = ExtractionClient::new(&config.backend)?;
    let document = client.extract(&file).await?;

    let stem = document_stem(&file);
    let tokens = match load_tokens_for(&config.paths.token_dir, &file) {
        Ok(index) => index,
        Err(err) => {
            warn!("Token file unavailable: {}", err.user_message());
            TokenIndex::default()
        }
    };

    let output_path =
        output.unwrap_or_else(|| config.paths.output_dir.join(format!("{}_extraction.json", stem)));
    document.save_to_file(&output_path)?;

    println!("📄 Document id: {}", document.document_id.as_deref().unwrap_or("(none)"));
    println!("   Rows: {}", document.table.row_count());
    println!("   Pages: {}", document.images.len());
    println!("   Tokens: {} ({} bound)", tokens.len(), document.table.bound_count());
    println!("💾 Snapshot saved to {}", output_path.display());
    Ok(())
}

pub struct RenderOptions {
    pub page: usize,
    pub zoom_steps: i32,
    pub select: Option<CellRef>,
    pub output: PathBuf,
}

/// Draw one page with its overlay to PNG
pub async fn render_command(mut session: Session, config: &LedgerConfig, options: RenderOptions) -> Result<()> {
    if options.page > 0 && session.update(Action::ChangePage(options.page)) != Outcome::Redraw {
        return Err(anyhow!(
            "page {} out of range (document has {} pages)",
            options.page,
            session.page_count()
        ));
    }
    let direction = if options.zoom_steps >= 0 {
        ZoomDirection::In
    } else {
        ZoomDirection::Out
    };
    for _ in 0..options.zoom_steps.unsigned_abs() {
        session.update(Action::Zoom(direction));
    }
    if let Some(cell) = options.select {
        if let Some(notice) = session.update(Action::SelectCell(cell)).notice() {
            return Err(anyhow!("{}", notice));
        }
    }

    let page = session.view().current_page;
    let mut loader = ImageLoader::new(config.paths.asset_root.clone());
    loader.request(page, session.image_reference(page));
    let image = loader.next_current().await.and_then(|loaded| loaded.result.ok());

    let frame = session.render(image.is_some());
    let canvas = rasterize(&frame, image.as_ref());
    save_png(&canvas, &options.output)?;

    println!(
        "🖼️  Page {} at {:.0}% → {} ({} highlights)",
        page,
        session.view().zoom_level * 100.0,
        options.output.display(),
        frame.highlights.len()
    );
    Ok(())
}

/// Print the balance classification of every row
pub fn check_command(session: &Session) -> Result<usize> {
    let results = annotate(session.table());
    let mut invalid = 0;

    println!("{:>4}  {:<12} {:>14} {:>14} {:>10}", "row", "account", "computed", "stored", "status");
    for result in &results {
        let account = session
            .table()
            .cell(CellRef::new(result.row, ColumnKey::Account))
            .map(|c| c.value.as_str())
            .unwrap_or_default();
        let status = if result.valid { "✅ ok" } else { "❌ off" };
        if !result.valid {
            invalid += 1;
        }
        println!(
            "{:>4}  {:<12} {:>14.2} {:>14.2} {:>10}",
            result.row, account, result.computed, result.stored, status
        );
    }
    println!("{} of {} rows balanced", results.len() - invalid, results.len());
    Ok(invalid)
}

pub struct Corrections {
    pub bindings: Vec<(CellRef, String)>,
    pub clears: Vec<CellRef>,
    pub edits: Vec<(CellRef, String)>,
}

/// Replay corrections through the interaction controller
pub fn apply_corrections(session: &mut Session, corrections: &Corrections) -> Result<()> {
    for at in &corrections.clears {
        if let Some(notice) = session.update(Action::ActivateCell(*at)).notice() {
            return Err(anyhow!("clear {}: {}", at, notice));
        }
    }

    for (at, token_id) in &corrections.bindings {
        let page = session
            .tokens()
            .get(token_id)
            .map(|t| t.page)
            .ok_or_else(|| anyhow!("unknown token '{}'", token_id))?;
        session.update(Action::ChangePage(page));

        if let Some(notice) = session.update(Action::SelectCell(*at)).notice() {
            return Err(anyhow!("bind {}: {}", at, notice));
        }
        let (x, y) = session
            .pointer_target(token_id)
            .ok_or_else(|| anyhow!("token '{}' is not on page {}", token_id, page))?;
        if session.update(Action::PointerPick { x, y }) != Outcome::Redraw {
            return Err(anyhow!("could not bind token '{}' to {}", token_id, at));
        }
        // An earlier overlapping token wins the hit test
        let bound = session.table().cell(*at).and_then(|c| c.token_id.clone());
        if bound.as_deref() != Some(token_id.as_str()) {
            return Err(anyhow!(
                "bind {}: pick for token '{}' hit token '{}' instead",
                at,
                token_id,
                bound.as_deref().unwrap_or("none")
            ));
        }
    }

    for (at, text) in &corrections.edits {
        if let Some(notice) = session.update(Action::EditValue(*at, text.clone())).notice() {
            return Err(anyhow!("edit {}: {}", at, notice));
        }
    }
    Ok(())
}

/// Apply corrections, submit them and write the local artifact
pub async fn submit_command(mut session: Session, config: &LedgerConfig, corrections: Corrections) -> Result<()> {
    apply_corrections(&mut session, &corrections)?;

    for record in session.journal().records() {
        println!(
            "📝 {} {:?} row {} {}: {:?} → {:?} ({})",
            record.at.format("%H:%M:%S"),
            record.kind,
            record.row,
            record.column,
            record.old_token,
            record.new_token,
            record.value
        );
    }

    let client = ExtractionClient::new(&config.backend)?;
    let report = save_session(&session, &client, &config.paths.output_dir).await?;

    println!("💾 Local copy: {}", report.artifact.display());
    match report.submission {
        Ok(()) => println!("✅ Corrections sent to {}", client.base_url()),
        Err(err) => {
            println!("❌ Corrections not sent: {}", err.user_message());
            return Err(err.into());
        }
    }
    Ok(())
}

/// Show the effective configuration, or write it out
pub fn config_command(config: &LedgerConfig, init: Option<PathBuf>) -> Result<()> {
    match init {
        Some(path) => {
            config.save_to_file(&path)?;
            println!("⚙️  Wrote configuration to {}", path.display());
        }
        None => {
            let text = toml::to_string_pretty(config)?;
            println!("{}", text);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("0:compte"), Ok(CellRef::new(0, ColumnKey::Account)));
        assert_eq!(parse_cell("3:openingBalance"), Ok(CellRef::new(3, ColumnKey::OpeningBalance)));
        assert!(parse_cell("x:compte").is_err());
        assert!(parse_cell("1:nope").is_err());
        assert!(parse_cell("1").is_err());
    }

    #[test]
    fn test_parse_binding() {
        let (cell, token) = parse_binding("2:débit=17").unwrap();
        assert_eq!(cell, CellRef::new(2, ColumnKey::Debit));
        assert_eq!(token, "17");
    }

    fn overlapping_session() -> Session {
        let document = ExtractedDocument::from_response(&serde_json::json!({
            "documentId": "d",
            "images": ["p0.png"],
            "data": [{ "compte": ["1", null] }]
        }));
        let tokens = TokenIndex::from_json(
            r#"[
                {"id": "A", "text": "big", "page": 0, "x0": 0, "y0": 0, "x1": 300, "y1": 300},
                {"id": "B", "text": "small", "page": 0, "x0": 100, "y0": 100, "x1": 120, "y1": 110},
                {"id": "C", "text": "apart", "page": 0, "x0": 400, "y0": 400, "x1": 450, "y1": 420}
            ]"#,
        )
        .unwrap();
        Session::new(document, tokens, &crate::config::ViewConfig::default())
    }

    #[test]
    fn test_bind_rejects_pick_won_by_overlapping_token() {
        let mut session = overlapping_session();
        let corrections = Corrections {
            bindings: vec![(CellRef::new(0, ColumnKey::Account), "B".to_string())],
            clears: Vec::new(),
            edits: Vec::new(),
        };

        let err = apply_corrections(&mut session, &corrections).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'B'"), "{}", message);
        assert!(message.contains("'A'"), "{}", message);
    }

    #[test]
    fn test_bind_applies_unobstructed_token() {
        let mut session = overlapping_session();
        let account = CellRef::new(0, ColumnKey::Account);
        let corrections = Corrections {
            bindings: vec![(account, "C".to_string())],
            clears: Vec::new(),
            edits: Vec::new(),
        };

        apply_corrections(&mut session, &corrections).unwrap();
        let cell = session.table().cell(account).unwrap();
        assert_eq!(cell.token_id.as_deref(), Some("C"));
        assert_eq!(cell.value, "apart");
    }
}
