//! Workspace surfaces
//!
//! Each surface owns its own state and talks to the others only through the
//! event bus.

pub mod analysis;
pub mod text_editor;
pub mod translator;

pub use analysis::AnalysisPanel;
pub use text_editor::DocumentEditor;
pub use translator::{TranslateCoordinator, TranslatorOptions};
