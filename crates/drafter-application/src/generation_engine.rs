//! GenerationEngine - streams model output into the active draft.
//!
//! One run at a time. A run resolves the placeholder plan from the current
//! buffer, builds messages, streams tokens into the buffer as they arrive
//! and records an undo entry when it ends. Cancellation goes through a
//! [`CancellationToken`] owned by the run.

use crate::notice::{Notice, Notifier};
use drafter_core::error::DrafterError;
use drafter_core::generation::{
    GenerationBackend, GenerationRequest, SamplingParams, build_messages,
};
use drafter_core::history::HistoryTable;
use drafter_core::plan::resolve_plan;
use drafter_core::session::GenerationSettings;
use drafter_core::template::Template;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// The editor buffer a run writes into.
///
/// Implementations must ignore writes for a session that is no longer the
/// active one.
pub trait DraftBuffer: Send + Sync {
    fn active_session_id(&self) -> Option<String>;

    /// Text of the active session's buffer.
    fn text(&self) -> String;

    /// Replaces the buffer text if `session_id` is still active. Returns
    /// false when it is not.
    fn replace_text(&self, session_id: &str, text: String) -> bool;
}

/// Inputs for one run, captured when it starts.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub session_id: String,
    pub model: Option<String>,
    pub online: bool,
    pub chat_mode: bool,
    pub settings: GenerationSettings,
    pub template_name: Option<String>,
    pub template: Option<Template>,
    pub system_prompt: Option<String>,
}

/// Why a run did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyGenerating,
    NoActiveSession,
    Offline,
    NoModel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Skipped(SkipReason),
    Completed { tokens: usize },
    Cancelled { tokens: usize },
    Failed { tokens: usize, error: DrafterError },
}

struct ActiveRun {
    id: u64,
    session_id: String,
    cancel: CancellationToken,
}

#[derive(Default)]
struct EngineState {
    run: Option<ActiveRun>,
    next_run_id: u64,
    histories: HistoryTable,
    /// Templates already warned about falling back to the generic fill prompt.
    fim_warned: HashSet<Option<String>>,
}

#[derive(Clone, Copy)]
enum HistoryStep {
    Undo,
    Redo,
}

/// Releases the run slot if a run's future is dropped before it finishes.
struct RunSlot<'a> {
    engine: &'a GenerationEngine,
    run_id: u64,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.state();
        if state.run.as_ref().is_some_and(|run| run.id == self.run_id) {
            state.run = None;
        }
    }
}

pub struct GenerationEngine {
    backend: Arc<dyn GenerationBackend>,
    notifier: Notifier,
    state: Mutex<EngineState>,
}

impl GenerationEngine {
    pub fn new(backend: Arc<dyn GenerationBackend>, notifier: Notifier) -> Self {
        Self {
            backend,
            notifier,
            state: Mutex::new(EngineState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_generating(&self) -> bool {
        self.state().run.is_some()
    }

    /// Runs one generation against `buffer`.
    pub async fn generate(
        &self,
        buffer: &dyn DraftBuffer,
        ctx: GenerationContext,
    ) -> GenerationOutcome {
        let (run_id, cancel) = match self.begin(buffer, &ctx) {
            Ok(run) => run,
            Err(reason) => {
                tracing::debug!("[GenerationEngine] Not generating: {:?}", reason);
                return GenerationOutcome::Skipped(reason);
            }
        };
        let _slot = RunSlot {
            engine: self,
            run_id,
        };
        let session_id = ctx.session_id.clone();

        let original = buffer.text();
        let plan = resolve_plan(&original);
        let prompt = build_messages(&plan, ctx.chat_mode, ctx.template.as_ref());

        if prompt.fim_fallback && self.state().fim_warned.insert(ctx.template_name.clone()) {
            self.notifier.notify(Notice::FimFallback {
                template: ctx.template_name.clone(),
            });
        }
        if !prompt.discarded.is_empty() {
            self.notifier.notify(Notice::TextDiscarded {
                session_id: session_id.clone(),
                spans: prompt.discarded.clone(),
            });
        }

        if plan.has_placeholder() {
            buffer.replace_text(&session_id, plan.compose(""));
        }

        let request = GenerationRequest {
            model: ctx.model.clone().unwrap_or_default(),
            messages: prompt.messages,
            params: SamplingParams::from(&ctx.settings),
            system_prompt: ctx.system_prompt.clone(),
        };
        tracing::info!(
            "[GenerationEngine] Generating for {} ({:?}, {} messages)",
            session_id,
            plan.mode,
            request.messages.len()
        );

        let mut generated = String::new();
        let mut tokens = 0usize;
        let mut failure = None;

        match self.backend.stream(request, cancel.clone()).await {
            Ok(mut stream) => loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = stream.next() => next,
                };
                match next {
                    None => break,
                    Some(Ok(token)) => {
                        generated.push_str(&token);
                        tokens += 1;
                        if !buffer.replace_text(&session_id, plan.compose(&generated)) {
                            tracing::debug!(
                                "[GenerationEngine] Session {} is no longer active, stopping",
                                session_id
                            );
                            cancel.cancel();
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                }
            },
            Err(e) => failure = Some(e),
        }

        let aborted = cancel.is_cancelled() || failure.as_ref().is_some_and(|e| e.is_aborted());
        let still_active = buffer.active_session_id().as_deref() == Some(session_id.as_str());

        {
            let mut state = self.state();
            state.run = None;
            if tokens > 0 && still_active {
                state
                    .histories
                    .entry(&session_id)
                    .record(original.clone(), plan.compose(&generated));
            }
        }

        if tokens == 0 && still_active {
            buffer.replace_text(&session_id, original);
        }

        if aborted {
            tracing::info!(
                "[GenerationEngine] Cancelled for {} after {} tokens",
                session_id,
                tokens
            );
            return GenerationOutcome::Cancelled { tokens };
        }

        match failure {
            Some(error) => {
                tracing::warn!("[GenerationEngine] Generation failed: {}", error);
                self.notifier.notify(Notice::GenerationFailed {
                    session_id,
                    message: error.to_string(),
                });
                GenerationOutcome::Failed { tokens, error }
            }
            None => {
                tracing::info!(
                    "[GenerationEngine] Completed for {} with {} tokens",
                    session_id,
                    tokens
                );
                GenerationOutcome::Completed { tokens }
            }
        }
    }

    /// Checks the preconditions and claims the run slot.
    fn begin(
        &self,
        buffer: &dyn DraftBuffer,
        ctx: &GenerationContext,
    ) -> Result<(u64, CancellationToken), SkipReason> {
        let mut state = self.state();
        if state.run.is_some() {
            return Err(SkipReason::AlreadyGenerating);
        }
        if buffer.active_session_id().as_deref() != Some(ctx.session_id.as_str()) {
            return Err(SkipReason::NoActiveSession);
        }
        if !ctx.online {
            return Err(SkipReason::Offline);
        }
        if ctx.model.as_deref().is_none_or(|m| m.trim().is_empty()) {
            return Err(SkipReason::NoModel);
        }

        state.next_run_id += 1;
        let id = state.next_run_id;
        let cancel = CancellationToken::new();
        state.run = Some(ActiveRun {
            id,
            session_id: ctx.session_id.clone(),
            cancel: cancel.clone(),
        });
        Ok((id, cancel))
    }

    /// Cancels the running generation. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match &self.state().run {
            Some(run) => {
                tracing::debug!("[GenerationEngine] Cancelling run for {}", run.session_id);
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Restores the buffer to before the latest run. Disabled while
    /// generating.
    pub fn undo(&self, buffer: &dyn DraftBuffer) -> bool {
        self.step_history(buffer, HistoryStep::Undo)
    }

    /// Re-applies the most recently undone run. Disabled while generating.
    pub fn redo(&self, buffer: &dyn DraftBuffer) -> bool {
        self.step_history(buffer, HistoryStep::Redo)
    }

    /// The entry moves between stacks only once the buffer accepted the
    /// text. The engine lock is held across the write so no run can start
    /// in between.
    fn step_history(&self, buffer: &dyn DraftBuffer, step: HistoryStep) -> bool {
        let Some(session_id) = buffer.active_session_id() else {
            return false;
        };
        let mut state = self.state();
        if state.run.is_some() {
            return false;
        }
        let text = state.histories.get(&session_id).and_then(|history| match step {
            HistoryStep::Undo => history.peek_undo(),
            HistoryStep::Redo => history.peek_redo(),
        });
        let Some(text) = text.map(str::to_string) else {
            return false;
        };
        if !buffer.replace_text(&session_id, text) {
            tracing::debug!(
                "[GenerationEngine] Session {} no longer active, history left as is",
                session_id
            );
            return false;
        }
        let history = state.histories.entry(&session_id);
        match step {
            HistoryStep::Undo => history.undo(),
            HistoryStep::Redo => history.redo(),
        };
        true
    }

    pub fn can_undo(&self, session_id: &str) -> bool {
        let state = self.state();
        state.run.is_none() && state.histories.can_undo(session_id)
    }

    pub fn can_redo(&self, session_id: &str) -> bool {
        let state = self.state();
        state.run.is_none() && state.histories.can_redo(session_id)
    }

    /// Drops a session's history.
    pub fn evict(&self, session_id: &str) {
        self.state().histories.evict(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use drafter_core::error::Result;
    use drafter_core::generation::{ChatRole, TokenStream};
    use futures::stream;
    use std::time::Duration;

    /// A single-session buffer.
    #[derive(Default)]
    struct TestBuffer {
        active: Mutex<Option<String>>,
        text: Mutex<String>,
    }

    impl TestBuffer {
        fn new(session_id: &str, text: &str) -> Self {
            Self {
                active: Mutex::new(Some(session_id.to_string())),
                text: Mutex::new(text.to_string()),
            }
        }

        fn get(&self) -> String {
            self.text.lock().unwrap().clone()
        }
    }

    impl DraftBuffer for TestBuffer {
        fn active_session_id(&self) -> Option<String> {
            self.active.lock().unwrap().clone()
        }

        fn text(&self) -> String {
            self.get()
        }

        fn replace_text(&self, session_id: &str, text: String) -> bool {
            if self.active_session_id().as_deref() != Some(session_id) {
                return false;
            }
            *self.text.lock().unwrap() = text;
            true
        }
    }

    /// Reports its session, then switches to another one before the next
    /// write lands.
    struct SwitchingBuffer {
        inner: TestBuffer,
        next: String,
    }

    impl DraftBuffer for SwitchingBuffer {
        fn active_session_id(&self) -> Option<String> {
            let current = self.inner.active_session_id();
            *self.inner.active.lock().unwrap() = Some(self.next.clone());
            current
        }

        fn text(&self) -> String {
            self.inner.get()
        }

        fn replace_text(&self, session_id: &str, text: String) -> bool {
            self.inner.replace_text(session_id, text)
        }
    }

    /// Replays scripted tokens, pausing between them, and records requests.
    struct ScriptedBackend {
        items: Vec<Result<String>>,
        delay: Duration,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedBackend {
        fn tokens(tokens: &[&str]) -> Self {
            Self::new(tokens.iter().map(|t| Ok(t.to_string())).collect())
        }

        fn new(items: Vec<Result<String>>) -> Self {
            Self {
                items,
                delay: Duration::from_millis(10),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn stream(
            &self,
            request: GenerationRequest,
            _cancel: CancellationToken,
        ) -> Result<TokenStream> {
            self.requests.lock().unwrap().push(request);
            let delay = self.delay;
            let items = self.items.clone();
            Ok(stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed())
        }
    }

    fn ctx(session_id: &str) -> GenerationContext {
        GenerationContext {
            session_id: session_id.to_string(),
            model: Some("test-model".into()),
            online: true,
            ..Default::default()
        }
    }

    fn engine(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, GenerationEngine) {
        let backend = Arc::new(backend);
        let (notifier, _notices) = Notifier::channel();
        (backend.clone(), GenerationEngine::new(backend, notifier))
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_then_undo_redo() {
        let (_, engine) = engine(ScriptedBackend::tokens(&[" upon", " a time"]));
        let buffer = TestBuffer::new("s1", "Once");

        let outcome = engine.generate(&buffer, ctx("s1")).await;
        assert_eq!(outcome, GenerationOutcome::Completed { tokens: 2 });
        assert_eq!(buffer.get(), "Once upon a time");
        assert!(engine.can_undo("s1"));

        assert!(engine.undo(&buffer));
        assert_eq!(buffer.get(), "Once");
        assert!(engine.redo(&buffer));
        assert_eq!(buffer.get(), "Once upon a time");
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_rejected_by_buffer_keeps_history() {
        let (_, engine) = engine(ScriptedBackend::tokens(&[" upon"]));
        let buffer = TestBuffer::new("s1", "Once");
        engine.generate(&buffer, ctx("s1")).await;

        let switching = SwitchingBuffer {
            inner: buffer,
            next: "s2".into(),
        };
        assert!(!engine.undo(&switching));
        assert_eq!(switching.inner.get(), "Once upon");
        assert!(engine.can_undo("s1"));
        assert!(!engine.can_redo("s1"));

        *switching.inner.active.lock().unwrap() = Some("s1".into());
        assert!(engine.undo(&switching.inner));
        assert_eq!(switching.inner.get(), "Once");
        assert!(engine.can_redo("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_predict_marker_is_replaced_in_place() {
        let (backend, engine) = engine(ScriptedBackend::tokens(&["middle"]));
        let buffer = TestBuffer::new("s1", "start {predict} end");

        engine.generate(&buffer, ctx("s1")).await;
        assert_eq!(buffer.get(), "start middle end");
        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].role, ChatRole::User);
        assert_eq!(requests[0].messages[0].content, "start ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_guards_skip_without_touching_buffer() {
        let (backend, engine) = engine(ScriptedBackend::tokens(&["x"]));
        let buffer = TestBuffer::new("s1", "text");

        let offline = GenerationContext {
            online: false,
            ..ctx("s1")
        };
        assert_eq!(
            engine.generate(&buffer, offline).await,
            GenerationOutcome::Skipped(SkipReason::Offline)
        );

        let no_model = GenerationContext {
            model: Some("  ".into()),
            ..ctx("s1")
        };
        assert_eq!(
            engine.generate(&buffer, no_model).await,
            GenerationOutcome::Skipped(SkipReason::NoModel)
        );

        assert_eq!(
            engine.generate(&buffer, ctx("other")).await,
            GenerationOutcome::Skipped(SkipReason::NoActiveSession)
        );

        assert!(backend.requests.lock().unwrap().is_empty());
        assert_eq!(buffer.get(), "text");
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_without_tokens_restores_buffer() {
        let (notifier, mut notices) = Notifier::channel();
        let backend = Arc::new(ScriptedBackend::new(vec![Err(DrafterError::network(
            "connection reset",
        ))]));
        let engine = GenerationEngine::new(backend, notifier);
        let buffer = TestBuffer::new("s1", "A {fill} B");

        let outcome = engine.generate(&buffer, ctx("s1")).await;
        assert!(matches!(outcome, GenerationOutcome::Failed { tokens: 0, .. }));
        assert_eq!(buffer.get(), "A {fill} B");
        assert!(!engine.can_undo("s1"));

        let mut saw_failure = false;
        while let Ok(notice) = notices.try_recv() {
            saw_failure |= matches!(notice, Notice::GenerationFailed { .. });
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_tokens_keeps_partial_output() {
        let (_, engine) = engine(ScriptedBackend::new(vec![
            Ok(" partial".into()),
            Err(DrafterError::network("connection reset")),
        ]));
        let buffer = TestBuffer::new("s1", "Text");

        let outcome = engine.generate(&buffer, ctx("s1")).await;
        assert!(matches!(outcome, GenerationOutcome::Failed { tokens: 1, .. }));
        assert_eq!(buffer.get(), "Text partial");
        assert!(engine.can_undo("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_stream_keeps_partial_output() {
        let (_, engine) = engine(ScriptedBackend::tokens(&["a", "b", "c", "d"]));
        let engine = Arc::new(engine);
        let buffer = Arc::new(TestBuffer::new("s1", ""));

        let run = {
            let engine = engine.clone();
            let buffer = buffer.clone();
            tokio::spawn(async move { engine.generate(buffer.as_ref(), ctx("s1")).await })
        };

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(engine.is_generating());
        assert!(!engine.can_undo("s1"));
        assert!(engine.cancel());

        let outcome = run.await.unwrap();
        assert_eq!(outcome, GenerationOutcome::Cancelled { tokens: 2 });
        assert_eq!(buffer.get(), "ab");
        assert!(!engine.is_generating());
        assert!(engine.can_undo("s1"));
        assert!(!engine.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_rejected_while_generating() {
        let (_, engine) = engine(ScriptedBackend::tokens(&["a", "b"]));
        let engine = Arc::new(engine);
        let buffer = Arc::new(TestBuffer::new("s1", ""));

        let run = {
            let engine = engine.clone();
            let buffer = buffer.clone();
            tokio::spawn(async move { engine.generate(buffer.as_ref(), ctx("s1")).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(
            engine.generate(buffer.as_ref(), ctx("s1")).await,
            GenerationOutcome::Skipped(SkipReason::AlreadyGenerating)
        );
        assert!(!engine.undo(buffer.as_ref()));
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_sessions_mid_stream_records_nothing() {
        let (_, engine) = engine(ScriptedBackend::tokens(&["a", "b", "c"]));
        let engine = Arc::new(engine);
        let buffer = Arc::new(TestBuffer::new("s1", "draft"));

        let run = {
            let engine = engine.clone();
            let buffer = buffer.clone();
            tokio::spawn(async move { engine.generate(buffer.as_ref(), ctx("s1")).await })
        };
        tokio::time::sleep(Duration::from_millis(15)).await;
        *buffer.active.lock().unwrap() = Some("s2".into());
        *buffer.text.lock().unwrap() = "other session".into();

        run.await.unwrap();
        assert_eq!(buffer.get(), "other session");
        assert!(!engine.can_undo("s1"));
        assert!(!engine.can_undo("s2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fim_fallback_notice_is_sent_once_per_template() {
        let (notifier, mut notices) = Notifier::channel();
        let engine = GenerationEngine::new(
            Arc::new(ScriptedBackend::tokens(&["x"])),
            notifier,
        );
        let buffer = TestBuffer::new("s1", "A {fill} B");

        engine.generate(&buffer, ctx("s1")).await;
        buffer.replace_text("s1", "C {fill} D".into());
        engine.generate(&buffer, ctx("s1")).await;

        let mut fallbacks = 0;
        while let Ok(notice) = notices.try_recv() {
            if matches!(notice, Notice::FimFallback { .. }) {
                fallbacks += 1;
            }
        }
        assert_eq!(fallbacks, 1);
    }
}
