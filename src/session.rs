//! Single-owner document session.
//!
//! A [`ViewSynchronizer`] is moved into a tokio task. [`SessionHandle`]s send
//! jobs over an mpsc channel and the task applies them one at a time in
//! arrival order, so toggles never interleave with a re-derivation.
//!
//! AI calls run outside the task. The rewrite is applied by a separate job only
//! after the provider answered in time, so a timed-out or cancelled call leaves
//! the session in its last consistent state.

use crate::advisor::{AdvisorConfig, AdvisorContext, AdvisorRequest, ChatMessage, ContextSource};
use crate::detect::{Category, DetectionSpan};
use crate::error::{Error, ExternalCallError, Result};
use crate::export::{self, ExportTarget};
use crate::external::AdvisorProvider;
use crate::mask::MaskedText;
use crate::policy::{MaskStrategy, Preset};
use crate::view::{ViewKind, ViewState, ViewSynchronizer};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Pending jobs per session before senders wait.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Instruction sent with [`SessionHandle::request_rewrite`].
pub const REWRITE_INSTRUCTION: &str =
    "Rewrite the masked résumé above to read more clearly. Return only the rewritten text.";

type Job = Box<dyn FnOnce(&mut ViewSynchronizer) + Send>;

/// Spawns session tasks.
pub struct DocumentSession;

impl DocumentSession {
    /// Move `view` into a new task. The task ends when every handle is
    /// dropped and yields the synchronizer back.
    pub fn spawn(view: ViewSynchronizer) -> (SessionHandle, JoinHandle<ViewSynchronizer>) {
        Self::spawn_with_depth(view, DEFAULT_QUEUE_DEPTH)
    }

    /// [`DocumentSession::spawn`] with an explicit queue depth.
    pub fn spawn_with_depth(
        mut view: ViewSynchronizer,
        depth: usize,
    ) -> (SessionHandle, JoinHandle<ViewSynchronizer>) {
        let (tx, mut rx) = mpsc::channel::<Job>(depth.max(1));
        let task = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job(&mut view);
            }
            log::debug!("document session closed");
            view
        });
        (SessionHandle { tx }, task)
    }
}

/// Cloneable handle to a session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Job>,
}

fn closed() -> Error {
    Error::InvalidState("document session has closed".to_string())
}

impl SessionHandle {
    /// Run `f` on the session task and return its result.
    pub async fn with<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut ViewSynchronizer) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::new(move |view| {
            let _ = reply.send(f(view));
        });
        self.tx.send(job).await.map_err(|_| closed())?;
        rx.await.map_err(|_| closed())
    }

    /// Enable or disable a category.
    pub async fn set_category_enabled(&self, category: Category, enabled: bool) -> Result<bool> {
        self.with(move |v| v.set_category_enabled(category, enabled)).await
    }

    /// Flip a category.
    pub async fn toggle_category(&self, category: Category) -> Result<bool> {
        self.with(move |v| v.toggle_category(category)).await
    }

    /// Change a category's strategy.
    pub async fn set_strategy(&self, category: Category, strategy: MaskStrategy) -> Result<()> {
        self.with(move |v| v.set_strategy(category, strategy)).await
    }

    /// Switch preset.
    pub async fn set_preset(&self, preset: Preset) -> Result<()> {
        self.with(move |v| v.set_preset(preset)).await
    }

    /// Make `view` active.
    pub async fn switch_view(&self, view: ViewKind) -> Result<()> {
        self.with(move |v| v.switch_view(view)).await?
    }

    /// Text of the active view.
    pub async fn active_text(&self) -> Result<String> {
        self.with(|v| v.active_text()).await?
    }

    /// Text of `view`.
    pub async fn view_text(&self, view: ViewKind) -> Result<String> {
        self.with(move |v| v.view_text(view)).await?
    }

    /// Current masked text.
    pub async fn masked(&self) -> Result<MaskedText> {
        self.with(|v| v.masked().clone()).await
    }

    /// Current spans.
    pub async fn spans(&self) -> Result<Vec<DetectionSpan>> {
        self.with(|v| v.spans().to_vec()).await
    }

    /// Snapshot of the user-facing state.
    pub async fn state(&self) -> Result<ViewState> {
        self.with(|v| v.state()).await
    }

    /// Store an AI rewrite.
    pub async fn set_ai_text(&self, text: String) -> Result<()> {
        self.with(move |v| v.set_ai_text(text)).await
    }

    /// Build an advisor context from the current state.
    pub async fn advisor_context(
        &self,
        file_name: String,
        source: ContextSource,
        config: AdvisorConfig,
    ) -> Result<AdvisorContext> {
        self.with(move |v| AdvisorContext::build(v, &file_name, source, &config))
            .await
    }

    /// Export the active view.
    pub async fn export(&self, target: ExportTarget) -> Result<Vec<u8>> {
        self.with(move |v| {
            let text = v.active_text()?;
            export::export(&text, &v.normalized().offset_map, target)
        })
        .await?
    }

    /// Ask `provider` a question about the document.
    ///
    /// The call runs outside the session task and is bounded by `timeout`.
    pub async fn ask(
        &self,
        provider: &dyn AdvisorProvider,
        file_name: &str,
        history: &[ChatMessage],
        question: &str,
        config: &AdvisorConfig,
        timeout: Duration,
    ) -> Result<String> {
        let context = self
            .advisor_context(file_name.to_string(), ContextSource::Masked, config.clone())
            .await?;
        let request = AdvisorRequest::new(&context, history, question, config);
        call_with_timeout(provider, &request, timeout).await
    }

    /// Ask `provider` for a rewrite of the masked text and store it as the AI
    /// view. Nothing is stored unless the provider answers within `timeout`.
    pub async fn request_rewrite(
        &self,
        provider: &dyn AdvisorProvider,
        file_name: &str,
        config: &AdvisorConfig,
        timeout: Duration,
    ) -> Result<String> {
        let rewrite = self
            .ask(provider, file_name, &[], REWRITE_INSTRUCTION, config, timeout)
            .await?;
        self.set_ai_text(rewrite.clone()).await?;
        Ok(rewrite)
    }
}

async fn call_with_timeout(
    provider: &dyn AdvisorProvider,
    request: &AdvisorRequest,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, provider.complete(request)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => {
            log::warn!("advisor '{}' failed: {}", provider.name(), e);
            Err(e.into())
        }
        Err(_) => {
            log::warn!("advisor '{}' timed out after {:?}", provider.name(), timeout);
            Err(ExternalCallError::Timeout(timeout).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::{decode, DecodeLimits};
    use crate::detect::{KeywordSet, PiiDetector};
    use crate::format::Format;
    use crate::policy::CategoryPolicy;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl AdvisorProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &AdvisorRequest) -> std::result::Result<String, ExternalCallError> {
            Ok(format!("{} messages", request.messages.len()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl AdvisorProvider for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn complete(&self, _request: &AdvisorRequest) -> std::result::Result<String, ExternalCallError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn spawn() -> (SessionHandle, JoinHandle<ViewSynchronizer>) {
        let text = "Name: Taro Yamada\nEmail: taro@example.com";
        let normalized = decode(text.as_bytes(), Format::PlainText, &DecodeLimits::default()).unwrap();
        let view = ViewSynchronizer::new(
            normalized,
            &PiiDetector::default(),
            KeywordSet::new(),
            CategoryPolicy::from_preset(Preset::Standard),
        )
        .unwrap();
        DocumentSession::spawn(view)
    }

    #[tokio::test]
    async fn test_toggles_applied_in_order() {
        let (handle, task) = spawn();
        for i in 0..9 {
            handle.set_category_enabled(Category::Email, i % 2 == 1).await.unwrap();
        }
        assert_eq!(handle.masked().await.unwrap().text, "Name: [NAME]\nEmail: taro@example.com");
        drop(handle);
        let view = task.await.unwrap();
        assert!(!view.policy().is_enabled(Category::Email));
    }

    #[tokio::test]
    async fn test_concurrent_handles() {
        let (handle, _task) = spawn();
        let mut tasks = Vec::new();
        for category in [Category::Name, Category::Email, Category::Url] {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move { h.toggle_category(category).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let state = handle.state().await.unwrap();
        assert!(!state.policy.is_enabled(Category::Name));
        assert!(!state.policy.is_enabled(Category::Email));
        assert!(state.policy.is_enabled(Category::Url));
        assert!(handle.masked().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_applied() {
        let (handle, _task) = spawn();
        let text = handle
            .request_rewrite(&Echo, "cv.txt", &AdvisorConfig::default(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(text, "2 messages");
        handle.switch_view(ViewKind::Ai).await.unwrap();
        assert_eq!(handle.active_text().await.unwrap(), "2 messages");
    }

    #[tokio::test]
    async fn test_timeout_leaves_state() {
        let (handle, _task) = spawn();
        let before = handle.state().await.unwrap();
        let err = handle
            .request_rewrite(&Stalled, "cv.txt", &AdvisorConfig::default(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(ExternalCallError::Timeout(_))));
        assert_eq!(handle.state().await.unwrap(), before);
        assert!(handle.switch_view(ViewKind::Ai).await.is_err());
    }

    #[tokio::test]
    async fn test_export_active_view() {
        let (handle, _task) = spawn();
        let bytes = handle.export(ExportTarget::PlainText).await.unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "Name: [NAME]\nEmail: [EMAIL]\n");
    }
}
