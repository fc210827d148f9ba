//! Application layer for Drafter.
//!
//! Coordinates the editor-side workflows: debounced saving with optimistic
//! concurrency, conflict handling, streaming generation with undo/redo, and
//! search/replace over the active draft. [`WritingDesk`] ties them together.

pub mod conflict;
pub mod debounce;
pub mod generation_engine;
pub mod notice;
pub mod save_scheduler;
pub mod session_service;
pub mod template_cache;
pub mod theme_service;
pub mod writing_desk;

pub use conflict::ConflictHandler;
pub use debounce::DebounceTimer;
pub use generation_engine::{
    DraftBuffer, GenerationContext, GenerationEngine, GenerationOutcome, SkipReason,
};
pub use notice::{Notice, NoticeAction, Notifier, Politeness, ResourceKind};
pub use save_scheduler::{SaveScheduler, SaveStatus};
pub use session_service::SessionService;
pub use template_cache::TemplateCache;
pub use theme_service::ThemeService;
pub use writing_desk::{ActiveDraft, DeskServices, DeskStatus, WritingDesk};
