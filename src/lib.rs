//! LedgerLens: reconcile extracted financial tables with the document
//! tokens they were read from.

pub mod actions;
pub mod cli;
pub mod client;
pub mod config;
pub mod coordinate_mapping;
pub mod error;
pub mod export;
pub mod image_loader;
pub mod logging;
pub mod overlay;
pub mod raster;
pub mod session;
pub mod state;
pub mod table;
pub mod tokens;

#[cfg(feature = "gui")]
pub mod viewer;

pub use error::{LedgerError, LedgerResult};
pub use session::Session;
