pub mod journal;
pub mod selection;
pub mod view_state;

pub use journal::{CorrectionJournal, CorrectionKind, CorrectionRecord};
pub use selection::SelectionState;
pub use view_state::{ViewState, ZoomDirection};
