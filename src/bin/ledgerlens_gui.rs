use eframe::{egui, NativeOptions};

use ledgerlens::config::LedgerConfig;
use ledgerlens::logging::{init_logging, log_system_info, LoggingConfig};
use ledgerlens::viewer::LedgerLensApp;

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging(&LoggingConfig::default())?;
    log_system_info();

    let config = LedgerConfig::load_or_default(None)?;
    // Network calls and image decoding run here; the UI stays on the main thread
    let runtime = tokio::runtime::Runtime::new()?;
    let handle = runtime.handle().clone();

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_resizable(true)
            .with_title("LedgerLens - statement correction"),
        ..Default::default()
    };

    eframe::run_native(
        "LedgerLens",
        options,
        Box::new(move |cc| Ok(Box::new(LedgerLensApp::new(cc, config, handle)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {}", e))?;

    Ok(())
}
