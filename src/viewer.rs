//! eframe front end: correction table on the left, page with token overlay
//! in the centre.

use eframe::egui::*;
use std::path::PathBuf;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::actions::{Action, Outcome};
use crate::client::{document_stem, load_tokens_for, ExtractedDocument, ExtractionClient};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::export::{save_corrections, SaveReport};
use crate::image_loader::ImageLoader;
use crate::overlay::{Background, OverlayFrame, Rgba};
use crate::session::Session;
use crate::state::ZoomDirection;
use crate::table::{CellRef, ColumnKey, RowBalance};
use crate::tokens::TokenIndex;

/// Results of background work, delivered back to the frame loop
enum Completion {
    Extracted(LedgerResult<(ExtractedDocument, TokenIndex, String)>),
    Saved(LedgerResult<SaveReport>),
}

struct PageTexture {
    page: usize,
    generation: u64,
    texture: Option<TextureHandle>,
}

pub struct LedgerLensApp {
    config: LedgerConfig,
    runtime: Handle,
    client: Option<ExtractionClient>,
    session: Option<Session>,
    loader: ImageLoader,
    page_texture: Option<PageTexture>,
    /// Text being typed into each cell, resynced from the table on change
    edit_buffers: Vec<[String; 5]>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    busy: Option<String>,
    status_message: String,
    notice: Option<String>,
}

impl LedgerLensApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: LedgerConfig, runtime: Handle) -> Self {
        let client = match ExtractionClient::new(&config.backend) {
            Ok(client) => Some(client),
            Err(err) => {
                error!("HTTP client unavailable: {}", err);
                None
            }
        };
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            loader: ImageLoader::with_runtime(config.paths.asset_root.clone(), runtime.clone()),
            config,
            runtime,
            client,
            session: None,
            page_texture: None,
            edit_buffers: Vec::new(),
            completions_tx,
            completions_rx,
            busy: None,
            status_message: "📒 Open a statement to start".to_string(),
            notice: None,
        }
    }

    fn dispatch(&mut self, action: Action) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.update(action) {
            Outcome::Redraw => self.sync_buffers(),
            Outcome::Notice(message) => self.notice = Some(message),
            Outcome::Unchanged => {}
        }
    }

    fn sync_buffers(&mut self) {
        let Some(session) = self.session.as_ref() else {
            self.edit_buffers.clear();
            return;
        };
        self.edit_buffers = session
            .table()
            .rows()
            .iter()
            .map(|row| ColumnKey::ALL.map(|column| row.cell(column).value.clone()))
            .collect();
    }

    fn open_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Statements", &["pdf", "png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        let Some(client) = self.client.clone() else {
            self.notice = Some("HTTP client unavailable, check the logs".to_string());
            return;
        };

        self.busy = Some(format!("Extracting {}...", path.display()));
        let token_dir = self.config.paths.token_dir.clone();
        let tx = self.completions_tx.clone();
        self.runtime.spawn(async move {
            let result = extract_with_tokens(&client, path, token_dir).await;
            let _ = tx.send(Completion::Extracted(result));
        });
    }

    fn save(&mut self) {
        let (Some(session), Some(client)) = (self.session.as_ref(), self.client.clone()) else {
            self.notice = Some("No original file loaded".to_string());
            return;
        };

        let stem = session.original_filename().map(str::to_string);
        let document_id = session.document_id().map(str::to_string);
        let final_data = session.final_data();
        let output_dir = self.config.paths.output_dir.clone();
        let tx = self.completions_tx.clone();

        self.busy = Some("Sending corrections...".to_string());
        self.runtime.spawn(async move {
            let result = save_corrections(
                stem.as_deref(),
                document_id.as_deref(),
                &final_data,
                &client,
                &output_dir,
            )
            .await;
            let _ = tx.send(Completion::Saved(result));
        });
    }

    fn handle_completions(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.busy = None;
            match completion {
                Completion::Extracted(Ok((document, tokens, stem))) => {
                    let session = Session::new(document, tokens, &self.config.view).with_original_filename(stem);
                    self.status_message = format!(
                        "📄 {} rows, {} pages",
                        session.table().row_count(),
                        session.page_count()
                    );
                    self.session = Some(session);
                    self.page_texture = None;
                    self.sync_buffers();
                }
                Completion::Extracted(Err(err)) => {
                    crate::log_error!(err, "extract");
                    self.notice = Some(err.user_message());
                }
                Completion::Saved(Ok(report)) => {
                    self.status_message = format!("💾 Saved {}", report.artifact.display());
                    if let Err(err) = report.submission {
                        self.notice = Some(format!("Corrections not sent: {}", err.user_message()));
                    } else {
                        self.notice = Some("Corrections sent".to_string());
                    }
                }
                Completion::Saved(Err(err)) => {
                    crate::log_error!(err, "save");
                    self.notice = Some(err.user_message());
                }
            }
        }
    }

    /// Request the current page image when the page changed, and pick up
    /// finished loads
    fn refresh_page_image(&mut self, ctx: &Context) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let page = session.view().current_page;

        if self.page_texture.as_ref().map(|t| t.page) != Some(page) {
            let generation = self.loader.request(page, session.image_reference(page));
            self.page_texture = Some(PageTexture {
                page,
                generation,
                texture: None,
            });
        }

        if let Some(loaded) = self.loader.poll() {
            if let Some(current) = self.page_texture.as_mut().filter(|t| t.generation == loaded.generation) {
                current.texture = loaded.result.ok().map(|image| {
                    let rgba = image.to_rgba8();
                    let size = [rgba.width() as usize, rgba.height() as usize];
                    let color_image = ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                    ctx.load_texture(format!("page_{}", loaded.page), color_image, TextureOptions::LINEAR)
                });
                // Marks the load as finished even when it failed
                current.generation = 0;
            }
        }
    }

    fn image_pending(&self) -> bool {
        self.page_texture.as_ref().is_some_and(|t| t.generation != 0)
    }

    fn render_toolbar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            if ui.button("📂 Open").clicked() {
                self.open_file();
            }
            if ui.button("💾 Save").clicked() {
                self.save();
            }
            ui.separator();

            let Some(session) = self.session.as_ref() else {
                ui.label(&self.status_message);
                return;
            };
            let zoom = session.view().zoom_level;
            let current_page = session.view().current_page;
            let page_count = session.page_count();
            let mut balance = session.balance_check_enabled();

            ui.label("Zoom:");
            if ui.button("-").clicked() {
                self.dispatch(Action::Zoom(ZoomDirection::Out));
            }
            ui.label(format!("{:.0}%", zoom * 100.0));
            if ui.button("+").clicked() {
                self.dispatch(Action::Zoom(ZoomDirection::In));
            }
            ui.separator();

            let mut selected_page = current_page;
            ComboBox::from_label("Page")
                .selected_text(format!("{} / {}", current_page + 1, page_count.max(1)))
                .show_ui(ui, |ui| {
                    for page in 0..page_count {
                        ui.selectable_value(&mut selected_page, page, format!("Page {}", page + 1));
                    }
                });
            if selected_page != current_page {
                self.dispatch(Action::ChangePage(selected_page));
            }
            ui.separator();

            if ui.checkbox(&mut balance, "Check balances").changed() {
                self.dispatch(Action::ToggleBalanceCheck);
            }
            ui.separator();
            ui.label(&self.status_message);
        });
    }

    fn render_table(&mut self, ui: &mut Ui) {
        let Some(session) = self.session.as_ref() else {
            ui.label("No table loaded");
            return;
        };
        let balances: Option<Vec<RowBalance>> = session.balance_annotations();
        let selected = session.selection().selected();
        let mut actions = Vec::new();

        ScrollArea::vertical().show(ui, |ui| {
            Grid::new("assignment_table").striped(true).show(ui, |ui| {
                ui.label("");
                for column in ColumnKey::ALL {
                    ui.strong(column.label());
                }
                ui.end_row();

                for (row, buffers) in self.edit_buffers.iter_mut().enumerate() {
                    let marker = match balances.as_ref().and_then(|b| b.get(row)) {
                        Some(result) if result.valid => RichText::new("✅"),
                        Some(_) => RichText::new("❌").color(Color32::RED),
                        None => RichText::new(format!("{}", row + 1)),
                    };
                    ui.label(marker);

                    for column in ColumnKey::ALL {
                        let at = CellRef::new(row, column);
                        let stored = session.table().cell(at).map(|c| c.value.as_str()).unwrap_or_default();
                        let buffer = &mut buffers[column.index()];
                        let mut edit = TextEdit::singleline(buffer).desired_width(90.0);
                        if selected == Some(at) {
                            edit = edit.text_color(Color32::from_rgb(200, 120, 0));
                        }
                        let response = ui.add(edit);

                        if response.double_clicked() {
                            actions.push(Action::ActivateCell(at));
                        } else if response.clicked() {
                            actions.push(Action::SelectCell(at));
                        } else if response.secondary_clicked() {
                            actions.push(Action::HighlightCell(at));
                        }
                        if response.lost_focus() && buffer.as_str() != stored {
                            actions.push(Action::EditValue(at, buffer.clone()));
                        }
                    }
                    ui.end_row();
                }
            });
        });

        for action in actions {
            self.dispatch(action);
        }
    }

    fn render_page(&mut self, ui: &mut Ui) {
        let Some(session) = self.session.as_mut() else {
            ui.centered_and_justified(|ui| ui.label("📄 No document"));
            return;
        };
        session.set_device_pixel_ratio(ui.ctx().pixels_per_point());

        let texture = self.page_texture.as_ref().and_then(|t| t.texture.clone());
        let pending = self.page_texture.as_ref().is_some_and(|t| t.generation != 0);
        let frame = if texture.is_none() && pending {
            session.render(true).awaiting_image()
        } else {
            session.render(texture.is_some())
        };
        let zoom = frame.geometry.zoom;
        let display_size = vec2(
            frame.geometry.logical_width * zoom,
            frame.geometry.logical_height * zoom,
        );

        let mut pick = None;
        ScrollArea::both().show(ui, |ui| {
            let (rect, response) = ui.allocate_exact_size(display_size, Sense::click());
            paint_frame(ui.painter(), rect, &frame, texture.as_ref());

            if response.clicked() {
                if let Some(pos) = response.interact_pointer_pos() {
                    let offset = pos - rect.min;
                    pick = Some(Action::PointerPick {
                        x: offset.x,
                        y: offset.y,
                    });
                }
            }
        });

        if let Some(action) = pick {
            self.dispatch(action);
        }
    }

    fn render_notice(&mut self, ctx: &Context) {
        let Some(message) = self.notice.clone() else {
            return;
        };
        Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.notice = None;
                }
            });
    }
}

impl eframe::App for LedgerLensApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.handle_completions();
        self.refresh_page_image(ctx);

        TopBottomPanel::top("toolbar").show(ctx, |ui| self.render_toolbar(ui));
        if let Some(message) = &self.busy {
            TopBottomPanel::bottom("progress").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(message);
                });
            });
        }
        SidePanel::left("table")
            .resizable(true)
            .default_width(560.0)
            .show(ctx, |ui| self.render_table(ui));
        CentralPanel::default().show(ctx, |ui| self.render_page(ui));
        self.render_notice(ctx);

        if self.busy.is_some() || self.image_pending() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

async fn extract_with_tokens(
    client: &ExtractionClient,
    path: PathBuf,
    token_dir: PathBuf,
) -> LedgerResult<(ExtractedDocument, TokenIndex, String)> {
    let document = client.extract(&path).await?;
    let stem = document_stem(&path);
    let tokens = tokio::task::spawn_blocking(move || load_tokens_for(&token_dir, &path))
        .await
        .map_err(|e| LedgerError::General(e.into()))??;
    info!("Loaded {} tokens for {}", tokens.len(), stem);
    Ok((document, tokens, stem))
}

fn color(rgba: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(rgba.r, rgba.g, rgba.b, rgba.alpha_u8())
}

/// Logical frame coordinates → screen points inside `rect`
fn paint_frame(painter: &Painter, rect: Rect, frame: &OverlayFrame, texture: Option<&TextureHandle>) {
    let zoom = frame.geometry.zoom;
    match &frame.background {
        Background::PageImage { .. } => match texture {
            Some(texture) => {
                let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
                painter.image(texture.id(), rect, uv, Color32::WHITE);
            }
            None => {
                painter.rect_filled(rect, Rounding::ZERO, Color32::WHITE);
            }
        },
        Background::Placeholder {
            fill,
            text_color,
            message,
        } => {
            painter.rect_filled(rect, Rounding::ZERO, color(*fill));
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                message,
                FontId::proportional(20.0),
                color(*text_color),
            );
        }
    }

    for highlight in &frame.highlights {
        let r = highlight.rect;
        let token_rect = Rect::from_min_max(
            rect.min + vec2(r.left * zoom, r.top * zoom),
            rect.min + vec2(r.right * zoom, r.bottom * zoom),
        );
        painter.rect_filled(
            token_rect,
            Rounding::same(highlight.corner_radius * zoom),
            color(highlight.fill()),
        );
    }
}
