//! WritingDesk - the editor-facing façade.
//!
//! Holds the active draft and wires edits, generation, search and conflict
//! resolution to the services behind it. Every change to the draft, whether
//! typed, generated, replaced or undone, goes through one path that refreshes
//! the search matches and schedules a save when the draft is dirty.

use crate::conflict::ConflictHandler;
use crate::generation_engine::{
    DraftBuffer, GenerationContext, GenerationEngine, GenerationOutcome, SkipReason,
};
use crate::notice::{Notice, Notifier};
use crate::save_scheduler::{SaveScheduler, SaveStatus};
use crate::session_service::SessionService;
use crate::template_cache::TemplateCache;
use crate::theme_service::ThemeService;
use drafter_core::config::DrafterConfig;
use drafter_core::error::{DrafterError, Result};
use drafter_core::generation::GenerationBackend;
use drafter_core::search::{Replacement, SearchQuery, SearchState};
use drafter_core::session::{GenerationSettings, SessionApi, SessionPayload, WritingSession};
use drafter_core::template::TemplateApi;
use drafter_core::theme::ThemeApi;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Server APIs and the generation backend the desk talks to.
pub struct DeskServices {
    pub sessions: Arc<dyn SessionApi>,
    pub templates: Arc<dyn TemplateApi>,
    pub themes: Arc<dyn ThemeApi>,
    pub backend: Arc<dyn GenerationBackend>,
}

/// The open session as the editor sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDraft {
    pub session_id: String,
    pub name: String,
    pub payload: SessionPayload,
}

/// Everything a status bar needs for the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskStatus {
    pub session_id: String,
    pub dirty: bool,
    pub save: SaveStatus,
    pub generating: bool,
    pub can_undo: bool,
    pub can_redo: bool,
}

struct EditorState {
    active: Option<ActiveDraft>,
    online: bool,
    search: Option<SearchState>,
}

/// An edit applied to the active draft, ready to hand to the scheduler.
struct Applied {
    session_id: String,
    payload: SessionPayload,
}

pub struct WritingDesk {
    config: DrafterConfig,
    scheduler: SaveScheduler,
    conflicts: Arc<ConflictHandler>,
    sessions: SessionService,
    templates: TemplateCache,
    themes: ThemeService,
    engine: GenerationEngine,
    editor: Mutex<EditorState>,
}

impl WritingDesk {
    /// Builds a desk and the notice receiver the UI drains.
    ///
    /// Must be called inside a tokio runtime; background saves run there
    /// even when edits arrive from other threads.
    pub fn new(
        services: DeskServices,
        config: DrafterConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notifier, notices) = Notifier::channel();
        let conflicts = Arc::new(ConflictHandler::new(
            services.sessions.clone(),
            notifier.clone(),
            config.save.list_limit,
        ));
        let scheduler = SaveScheduler::new(
            services.sessions.clone(),
            conflicts.clone(),
            notifier.clone(),
            config.save.debounce(),
        );
        let desk = Self {
            sessions: SessionService::new(
                services.sessions,
                scheduler.clone(),
                conflicts.clone(),
            ),
            templates: TemplateCache::new(services.templates, conflicts.clone()),
            themes: ThemeService::new(services.themes, conflicts.clone()),
            engine: GenerationEngine::new(services.backend, notifier),
            scheduler,
            conflicts,
            config,
            editor: Mutex::new(EditorState {
                active: None,
                online: true,
                search: None,
            }),
        };
        (desk, notices)
    }

    fn editor(&self) -> MutexGuard<'_, EditorState> {
        self.editor.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn themes(&self) -> &ThemeService {
        &self.themes
    }

    pub fn config(&self) -> &DrafterConfig {
        &self.config
    }

    // ============================================================================
    // Session lifecycle
    // ============================================================================

    pub async fn create_session(&self, name: &str) -> Result<WritingSession> {
        let session = self
            .sessions
            .create(name, SessionPayload::default())
            .await?;
        self.activate(&session);
        Ok(session)
    }

    /// Opens a session, replacing the active one. Queued saves of the
    /// previous session are kept; its generation history is dropped.
    pub async fn open_session(&self, session_id: &str) -> Result<WritingSession> {
        let session = self.sessions.open(session_id).await?;
        self.activate(&session);
        Ok(session)
    }

    fn activate(&self, session: &WritingSession) {
        let previous = {
            let mut editor = self.editor();
            let previous = editor.active.replace(ActiveDraft {
                session_id: session.id.clone(),
                name: session.name.clone(),
                payload: session.payload.clone(),
            });
            if let Some(search) = editor.search.as_mut() {
                search.refresh(&session.payload.prompt);
            }
            previous
        };
        if let Some(previous) = previous.filter(|p| p.session_id != session.id) {
            self.engine.evict(&previous.session_id);
        }
        tracing::info!("[WritingDesk] Active session: {}", session.id);
    }

    pub fn close_session(&self) {
        let previous = {
            let mut editor = self.editor();
            editor.search = None;
            editor.active.take()
        };
        if let Some(previous) = previous {
            self.engine.evict(&previous.session_id);
            tracing::info!("[WritingDesk] Closed session {}", previous.session_id);
        }
    }

    pub fn active(&self) -> Option<ActiveDraft> {
        self.editor().active.clone()
    }

    pub async fn rename_session(&self, name: &str) -> Result<()> {
        let session_id = self.active_id()?;
        let renamed = self.sessions.rename(&session_id, name).await?;
        if let Some(active) = self
            .editor()
            .active
            .as_mut()
            .filter(|a| a.session_id == session_id)
        {
            active.name = renamed.name;
        }
        Ok(())
    }

    /// Deletes the active session and closes it.
    pub async fn delete_session(&self) -> Result<()> {
        let session_id = self.active_id()?;
        self.sessions.delete(&session_id).await?;
        if self.active_id().ok().as_deref() == Some(session_id.as_str()) {
            self.close_session();
        }
        Ok(())
    }

    pub async fn session_list(&self) -> Result<Vec<WritingSession>> {
        self.sessions.list().await
    }

    fn active_id(&self) -> Result<String> {
        self.editor()
            .active
            .as_ref()
            .map(|a| a.session_id.clone())
            .ok_or_else(|| DrafterError::validation("No session is open"))
    }

    // ============================================================================
    // Editing
    // ============================================================================

    /// Applies `change` to the active draft. Returns whether the draft now
    /// differs from the last saved state.
    pub fn edit(&self, change: impl FnOnce(&mut SessionPayload)) -> Result<bool> {
        let applied = {
            let mut editor = self.editor();
            let EditorState { active, search, .. } = &mut *editor;
            let active = active
                .as_mut()
                .ok_or_else(|| DrafterError::validation("No session is open"))?;
            change(&mut active.payload);
            if let Some(search) = search.as_mut() {
                search.refresh(&active.payload.prompt);
            }
            Applied {
                session_id: active.session_id.clone(),
                payload: active.payload.clone(),
            }
        };
        Ok(self.commit(applied))
    }

    fn commit(&self, applied: Applied) -> bool {
        self.scheduler
            .track_edit(&applied.session_id, &applied.payload)
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) -> Result<bool> {
        let prompt = prompt.into();
        self.edit(|payload| payload.prompt = prompt)
    }

    pub fn set_settings(&self, settings: GenerationSettings) -> Result<bool> {
        self.edit(|payload| payload.settings = settings)
    }

    pub fn set_template(&self, template_name: Option<String>) -> Result<bool> {
        self.edit(|payload| payload.template_name = template_name)
    }

    pub fn set_theme(&self, theme_name: Option<String>) -> Result<bool> {
        self.edit(|payload| payload.theme_name = theme_name)
    }

    pub fn set_chat_mode(&self, chat_mode: bool) -> Result<bool> {
        self.edit(|payload| payload.chat_mode = chat_mode)
    }

    pub fn set_online(&self, online: bool) {
        self.editor().online = online;
    }

    pub fn is_online(&self) -> bool {
        self.editor().online
    }

    /// Saves everything queued without waiting for the debounce.
    pub async fn flush(&self) {
        self.scheduler.flush_all().await;
    }

    pub fn status(&self) -> Option<DeskStatus> {
        let active = self.active()?;
        Some(DeskStatus {
            dirty: self
                .scheduler
                .is_dirty(&active.session_id, &active.payload),
            save: self.scheduler.status(&active.session_id),
            generating: self.engine.is_generating(),
            can_undo: self.engine.can_undo(&active.session_id),
            can_redo: self.engine.can_redo(&active.session_id),
            session_id: active.session_id,
        })
    }

    // ============================================================================
    // Generation
    // ============================================================================

    /// Generates into the active draft using its settings and template.
    pub async fn generate(&self) -> GenerationOutcome {
        let (active, online) = {
            let editor = self.editor();
            (editor.active.clone(), editor.online)
        };
        let Some(active) = active else {
            return GenerationOutcome::Skipped(SkipReason::NoActiveSession);
        };

        let template = match active.payload.template_name.as_deref() {
            Some(name) => match self.templates.get(name).await {
                Ok(template) => {
                    if template.is_none() {
                        tracing::warn!("[WritingDesk] Template '{}' not found", name);
                    }
                    template
                }
                Err(e) => {
                    tracing::warn!("[WritingDesk] Failed to load template '{}': {}", name, e);
                    None
                }
            },
            None => None,
        };

        let ctx = GenerationContext {
            session_id: active.session_id,
            model: self.config.generation.model.clone(),
            online,
            chat_mode: active.payload.chat_mode,
            settings: active.payload.settings,
            template_name: active.payload.template_name,
            template,
            system_prompt: self.config.generation.system_prompt.clone(),
        };
        self.engine.generate(self, ctx).await
    }

    pub fn cancel_generation(&self) -> bool {
        self.engine.cancel()
    }

    pub fn undo(&self) -> bool {
        self.engine.undo(self)
    }

    pub fn redo(&self) -> bool {
        self.engine.redo(self)
    }

    // ============================================================================
    // Search and replace
    // ============================================================================

    /// Starts or replaces the search over the active draft.
    pub fn search(&self, query: SearchQuery) -> SearchState {
        let mut editor = self.editor();
        let text = editor
            .active
            .as_ref()
            .map(|a| a.payload.prompt.clone())
            .unwrap_or_default();
        let mut search = SearchState::with_limit(query.clone(), self.config.search.max_matches);
        search.set_query(query, &text);
        editor.search = Some(search.clone());
        search
    }

    pub fn search_state(&self) -> Option<SearchState> {
        self.editor().search.clone()
    }

    pub fn clear_search(&self) {
        self.editor().search = None;
    }

    pub fn search_next(&self) -> Option<Range<usize>> {
        self.editor().search.as_mut()?.next()
    }

    pub fn search_previous(&self) -> Option<Range<usize>> {
        self.editor().search.as_mut()?.previous()
    }

    /// Replaces the current match. The result is an ordinary edit.
    pub fn replace_current(&self, replacement: &str) -> Option<Replacement> {
        self.replace_with(|search, text| search.replace_current(text, replacement))
    }

    /// Replaces every match in one edit.
    pub fn replace_all(&self, replacement: &str) -> Option<Replacement> {
        self.replace_with(|search, text| search.replace_all(text, replacement))
    }

    fn replace_with(
        &self,
        replace: impl FnOnce(&mut SearchState, &str) -> Option<Replacement>,
    ) -> Option<Replacement> {
        let (result, applied) = {
            let mut editor = self.editor();
            let EditorState { active, search, .. } = &mut *editor;
            let active = active.as_mut()?;
            let search = search.as_mut()?;
            let result = replace(search, &active.payload.prompt)?;
            active.payload.prompt = result.text.clone();
            let applied = Applied {
                session_id: active.session_id.clone(),
                payload: active.payload.clone(),
            };
            (result, applied)
        };
        self.commit(applied);
        Some(result)
    }

    // ============================================================================
    // Conflict resolution
    // ============================================================================

    /// Discards local edits of the active session in favour of the server copy.
    pub async fn reload_from_server(&self) -> Result<()> {
        let session_id = self.active_id()?;
        let server = self.scheduler.reload_from_server(&session_id).await?;
        let mut editor = self.editor();
        let EditorState { active, search, .. } = &mut *editor;
        if let Some(active) = active.as_mut().filter(|a| a.session_id == session_id) {
            active.name = server.name;
            active.payload = server.payload;
            if let Some(search) = search.as_mut() {
                search.refresh(&active.payload.prompt);
            }
        }
        Ok(())
    }

    /// Keeps local edits of the active session; the next save overwrites
    /// the server copy.
    pub async fn keep_local(&self) -> Result<()> {
        let session_id = self.active_id()?;
        self.scheduler.keep_local(&session_id).await?;
        let active = self.active().filter(|a| a.session_id == session_id);
        if let Some(active) = active {
            self.commit(Applied {
                session_id: active.session_id,
                payload: active.payload,
            });
        }
        Ok(())
    }

    /// Sessions as of the last list refresh.
    pub fn cached_session_list(&self) -> Vec<WritingSession> {
        self.conflicts.session_list()
    }
}

impl DraftBuffer for WritingDesk {
    fn active_session_id(&self) -> Option<String> {
        self.editor().active.as_ref().map(|a| a.session_id.clone())
    }

    fn text(&self) -> String {
        self.editor()
            .active
            .as_ref()
            .map(|a| a.payload.prompt.clone())
            .unwrap_or_default()
    }

    fn replace_text(&self, session_id: &str, text: String) -> bool {
        let applied = {
            let mut editor = self.editor();
            let EditorState { active, search, .. } = &mut *editor;
            let Some(active) = active.as_mut().filter(|a| a.session_id == session_id) else {
                return false;
            };
            active.payload.prompt = text;
            if let Some(search) = search.as_mut() {
                search.refresh(&active.payload.prompt);
            }
            Applied {
                session_id: active.session_id.clone(),
                payload: active.payload.clone(),
            }
        };
        self.commit(applied);
        true
    }
}
