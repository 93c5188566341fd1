// src/services/orchestrator.rs
use std::sync::Arc;

use log::{error, info, warn};
use uuid::Uuid;

use crate::errors::ThumbError;
use crate::models::*;
use crate::services::{CreativeModel, SessionStore};

pub const MISSING_TITLE_MESSAGE: &str = "Please enter a video title.";
pub const MISSING_SUBJECT_MESSAGE: &str = "Please upload your headshot image.";
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong during generation.";
pub const INTERRUPTED_MESSAGE: &str = "Generation was interrupted before it finished.";

/// Runs one generation attempt for a session: advice first, then the image.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<SessionStore>,
    model: Arc<dyn CreativeModel>,
}

impl Orchestrator {
    pub fn new(store: Arc<SessionStore>, model: Arc<dyn CreativeModel>) -> Self {
        Self { store, model }
    }

    pub fn check_preconditions(config: &GenerationConfig) -> Result<(), ThumbError> {
        if config.video_title.trim().is_empty() {
            return Err(ThumbError::Validation(MISSING_TITLE_MESSAGE.to_string()));
        }
        if config.face_image.is_none() {
            return Err(ThumbError::Validation(MISSING_SUBJECT_MESSAGE.to_string()));
        }
        Ok(())
    }

    /// Returns the final state. On failure the error is also recorded in the
    /// session so a polling client sees it.
    pub async fn run(&self, session_id: &Uuid) -> Result<GenerationState, ThumbError> {
        let config = self
            .store
            .begin_generation(session_id, |config| {
                Self::check_preconditions(config)?;
                Ok(format!("Targeting {}...", config.platform))
            })
            .await?;
        let guard = AttemptGuard::new(self.store.clone(), *session_id);
        info!("Generation started for session {} ({})", session_id, config.platform);

        let outcome = match self.generate(session_id, &config).await {
            Ok(image) => {
                let state = self
                    .store
                    .update_state(session_id, |s| s.finished(image).with_log("Visual ready!"))
                    .await;
                info!("Generation finished for session {}", session_id);
                state
            }
            Err(err) => {
                error!("Generation failed for session {}: {}", session_id, err);
                let message = match err.to_string() {
                    m if m.trim().is_empty() => FALLBACK_ERROR_MESSAGE.to_string(),
                    m => m,
                };
                self.store
                    .update_state(session_id, |s| s.failed(message))
                    .await
                    .and(Err(err))
            }
        };
        guard.disarm();
        outcome
    }

    async fn generate(&self, session_id: &Uuid, config: &GenerationConfig) -> Result<ImageData, ThumbError> {
        let advice = self.model.design_advice(config).await?;

        let hook_log = format!("AI Hook: \"{}\"", advice.hook_text);
        let has_reference = config.reference_image.is_some();
        self.store
            .update_state(session_id, |s| {
                let s = s.with_log(hook_log);
                let s = if has_reference {
                    s.with_log("Analyzing reference style...")
                } else {
                    s
                };
                s.generating()
                    .with_log("Generating platform-optimized composition...")
            })
            .await?;

        self.model.generate_image(config, &advice).await
    }
}

/// Clears the busy flags if an attempt is dropped before it records a final
/// state, so the session can be retried.
struct AttemptGuard {
    store: Arc<SessionStore>,
    session_id: Uuid,
    armed: bool,
}

impl AttemptGuard {
    fn new(store: Arc<SessionStore>, session_id: Uuid) -> Self {
        Self {
            store,
            session_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

fn mark_interrupted(state: GenerationState) -> GenerationState {
    if state.is_busy() {
        state.failed(INTERRUPTED_MESSAGE)
    } else {
        state
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Generation for session {} was interrupted", self.session_id);

        if self.store.try_update_state(&self.session_id, mark_interrupted) {
            return;
        }
        // Lock is contended; finish the cleanup on the runtime instead.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = self.store.clone();
            let session_id = self.session_id;
            handle.spawn(async move {
                let _ = store.update_state(&session_id, mark_interrupted).await;
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::gemini_service::NO_IMAGE_MESSAGE;
    use async_trait::async_trait;
    use std::future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted model that counts calls and returns canned outcomes.
    pub struct ScriptedModel {
        pub advice: Mutex<Option<Result<DesignAdvice, ThumbError>>>,
        pub image: Mutex<Option<Result<ImageData, ThumbError>>>,
        pub advice_calls: AtomicUsize,
        pub image_calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub fn new(
            advice: Result<DesignAdvice, ThumbError>,
            image: Result<ImageData, ThumbError>,
        ) -> Self {
            Self {
                advice: Mutex::new(Some(advice)),
                image: Mutex::new(Some(image)),
                advice_calls: AtomicUsize::new(0),
                image_calls: AtomicUsize::new(0),
            }
        }

        pub fn succeeding() -> Self {
            Self::new(Ok(sample_advice()), Ok(sample_image()))
        }

        pub fn calls(&self) -> (usize, usize) {
            (
                self.advice_calls.load(Ordering::SeqCst),
                self.image_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl CreativeModel for ScriptedModel {
        async fn design_advice(&self, _config: &GenerationConfig) -> Result<DesignAdvice, ThumbError> {
            self.advice_calls.fetch_add(1, Ordering::SeqCst);
            self.advice
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(sample_advice()))
        }

        async fn generate_image(
            &self,
            _config: &GenerationConfig,
            _advice: &DesignAdvice,
        ) -> Result<ImageData, ThumbError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            self.image
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(sample_image()))
        }
    }

    pub fn sample_advice() -> DesignAdvice {
        DesignAdvice {
            hook_text: "I QUIT MY JOB".into(),
            emotion: "excitement".into(),
            background_description: "a sunrise over a city skyline".into(),
            lighting_description: "golden hour".into(),
            composition_notes: "face right, text left third".into(),
            style_inspiration: None,
        }
    }

    pub fn sample_image() -> ImageData {
        ImageData {
            mime_type: "image/png".into(),
            data: "iVBORw0KGgo=".into(),
        }
    }

    async fn ready_session(store: &SessionStore) -> Uuid {
        let id = store.create().await.id;
        store
            .update_config(&id, ConfigEvent::SetTitle("Why I quit my job".into()))
            .await
            .unwrap();
        store
            .update_config(
                &id,
                ConfigEvent::SetImage {
                    slot: ImageSlot::Face,
                    image: sample_image(),
                },
            )
            .await
            .unwrap();
        id
    }

    #[actix_web::test]
    async fn empty_title_makes_no_remote_call() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::succeeding());
        let id = store.create().await.id;
        store
            .update_config(&id, ConfigEvent::SetTitle("   ".into()))
            .await
            .unwrap();

        let err = Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap_err();
        assert!(matches!(err, ThumbError::Validation(_)));
        assert_eq!(model.calls(), (0, 0));
        let state = store.get(&id).await.unwrap().state;
        assert_eq!(state.error.as_deref(), Some(MISSING_TITLE_MESSAGE));
        assert!(!state.is_busy());
    }

    #[actix_web::test]
    async fn missing_subject_makes_no_remote_call() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::succeeding());
        let id = store.create().await.id;
        store
            .update_config(&id, ConfigEvent::SetTitle("A title".into()))
            .await
            .unwrap();

        Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap_err();
        assert_eq!(model.calls(), (0, 0));
        let state = store.get(&id).await.unwrap().state;
        assert_eq!(state.error.as_deref(), Some(MISSING_SUBJECT_MESSAGE));
    }

    #[actix_web::test]
    async fn successful_attempt_stores_result() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::succeeding());
        let id = ready_session(&store).await;

        let state = Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap();
        assert_eq!(model.calls(), (1, 1));
        assert_eq!(state.result_image, Some(sample_image()));
        assert!(state.error.is_none());
        assert!(!state.is_analyzing && !state.is_generating);
        assert_eq!(
            state.logs,
            vec![
                "Visual ready!",
                "Generating platform-optimized composition...",
                "AI Hook: \"I QUIT MY JOB\"",
                "Targeting YouTube...",
            ]
        );
        assert_eq!(store.get(&id).await.unwrap().state, state);
    }

    #[actix_web::test]
    async fn reference_image_adds_log_and_trail_stays_capped() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::succeeding());
        let id = ready_session(&store).await;
        store
            .update_config(
                &id,
                ConfigEvent::SetImage {
                    slot: ImageSlot::Reference,
                    image: sample_image(),
                },
            )
            .await
            .unwrap();

        let state = Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap();
        assert_eq!(state.logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(state.logs[0], "Visual ready!");
        assert!(state.logs.contains(&"Analyzing reference style...".to_string()));
    }

    #[actix_web::test]
    async fn missing_image_payload_is_an_error() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::new(
            Ok(sample_advice()),
            Err(ThumbError::Remote(NO_IMAGE_MESSAGE.into())),
        ));
        let id = ready_session(&store).await;

        let err = Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap_err();
        assert!(matches!(err, ThumbError::Remote(_)));
        let state = store.get(&id).await.unwrap().state;
        assert_eq!(state.error.as_deref(), Some(NO_IMAGE_MESSAGE));
        assert!(state.result_image.is_none());
        assert!(!state.is_busy());
    }

    #[actix_web::test]
    async fn advice_failure_skips_image_call() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::new(
            Err(ThumbError::Remote("quota exceeded".into())),
            Ok(sample_image()),
        ));
        let id = ready_session(&store).await;

        Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap_err();
        assert_eq!(model.calls(), (1, 0));
        let state = store.get(&id).await.unwrap().state;
        assert_eq!(state.error.as_deref(), Some("quota exceeded"));
        assert_eq!(state.logs, vec!["Targeting YouTube...".to_string()]);
    }

    #[actix_web::test]
    async fn retrigger_after_failure_clears_previous_error() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::new(
            Err(ThumbError::Remote("network down".into())),
            Ok(sample_image()),
        ));
        let id = ready_session(&store).await;
        let orchestrator = Orchestrator::new(store.clone(), model.clone());

        orchestrator.run(&id).await.unwrap_err();
        let state = orchestrator.run(&id).await.unwrap();
        assert!(state.error.is_none());
        assert!(state.result_image.is_some());
        assert_eq!(model.calls(), (2, 1));
    }

    #[actix_web::test]
    async fn busy_session_is_rejected_without_remote_call() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::succeeding());
        let id = ready_session(&store).await;
        store
            .begin_generation(&id, |_| Ok("in flight".into()))
            .await
            .unwrap();

        let err = Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap_err();
        assert!(matches!(err, ThumbError::Busy));
        assert_eq!(model.calls(), (0, 0));
    }

    /// Advice call that never completes.
    struct StalledModel;

    #[async_trait]
    impl CreativeModel for StalledModel {
        async fn design_advice(&self, _config: &GenerationConfig) -> Result<DesignAdvice, ThumbError> {
            future::pending().await
        }

        async fn generate_image(
            &self,
            _config: &GenerationConfig,
            _advice: &DesignAdvice,
        ) -> Result<ImageData, ThumbError> {
            future::pending().await
        }
    }

    #[actix_web::test]
    async fn dropped_attempt_releases_the_session() {
        let store = Arc::new(SessionStore::new());
        let id = ready_session(&store).await;

        let stalled = Orchestrator::new(store.clone(), Arc::new(StalledModel));
        let attempt = tokio::time::timeout(Duration::from_millis(50), stalled.run(&id)).await;
        assert!(attempt.is_err());

        let state = store.get(&id).await.unwrap().state;
        assert!(!state.is_busy());
        assert_eq!(state.error.as_deref(), Some(INTERRUPTED_MESSAGE));

        let model = Arc::new(ScriptedModel::succeeding());
        let state = Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap();
        assert!(state.result_image.is_some());
        assert_eq!(model.calls(), (1, 1));
    }

    #[actix_web::test]
    async fn finished_attempt_is_not_marked_interrupted() {
        let store = Arc::new(SessionStore::new());
        let model = Arc::new(ScriptedModel::succeeding());
        let id = ready_session(&store).await;

        Orchestrator::new(store.clone(), model.clone()).run(&id).await.unwrap();
        let state = store.get(&id).await.unwrap().state;
        assert!(state.error.is_none());
        assert!(state.result_image.is_some());
    }
}
