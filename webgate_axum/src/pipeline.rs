//! Declared stage order and assembly of the full application router.

use std::sync::Arc;

use axum::{Router, middleware::from_fn_with_state};
use thiserror::Error;
use tower_http::LatencyUnit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use webgate::{
    AppConfig, AuthStateManager, CsrfGuard, PassThroughSerializer, SessionManager,
    SharedSessionStore, UserSerializer,
};

use crate::middleware::{auth_stage, csrf_stage, session_stage, static_files_stage};
use crate::router::{RouteGroups, build_router};
use crate::terminator::{error_terminator, panic_response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Access log: one span per request with status and latency.
    RequestLog,
    /// Restore the session before the handler, persist it afterwards.
    Session,
    /// Verify tokens on state-changing requests, issue one for views.
    Csrf,
    /// Restore the authenticated user from the session.
    Auth,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pipeline is missing the {0:?} stage")]
    MissingStage(Stage),

    #[error("Pipeline declares the {0:?} stage more than once")]
    DuplicateStage(Stage),

    #[error("{stage:?} stage must come after the {required:?} stage")]
    OutOfOrder { stage: Stage, required: Stage },

    #[error("Invalid route prefix '{0}': must start with '/' and not end with one")]
    InvalidPrefix(String),
}

/// Ordered list of stages; the first stage sees the request first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Stage::RequestLog,
            Stage::Session,
            Stage::Csrf,
            Stage::Auth,
        ])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn position(&self, stage: Stage) -> Result<usize, PipelineError> {
        self.stages
            .iter()
            .position(|s| *s == stage)
            .ok_or(PipelineError::MissingStage(stage))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].contains(stage) {
                return Err(PipelineError::DuplicateStage(*stage));
            }
        }

        let session = self.position(Stage::Session)?;
        let csrf = self.position(Stage::Csrf)?;
        let auth = self.position(Stage::Auth)?;

        if csrf < session {
            return Err(PipelineError::OutOfOrder {
                stage: Stage::Csrf,
                required: Stage::Session,
            });
        }
        if auth < session {
            return Err(PipelineError::OutOfOrder {
                stage: Stage::Auth,
                required: Stage::Session,
            });
        }
        if auth < csrf {
            return Err(PipelineError::OutOfOrder {
                stage: Stage::Auth,
                required: Stage::Csrf,
            });
        }
        Ok(())
    }

    /// Wrap `router` so stages execute in declared order.
    fn apply(&self, router: Router, state: &PipelineState) -> Router {
        // The last layer added is the outermost, so add in reverse.
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| match stage {
                Stage::RequestLog => router.layer(
                    TraceLayer::new_for_http()
                        .make_span_with(
                            DefaultMakeSpan::new()
                                .level(Level::INFO)
                                .include_headers(true),
                        )
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                ),
                // Static files are answered inside the session and ahead of CSRF.
                Stage::Session => router
                    .layer(from_fn_with_state(state.clone(), static_files_stage))
                    .layer(from_fn_with_state(state.clone(), session_stage)),
                Stage::Csrf => router.layer(from_fn_with_state(state.clone(), csrf_stage)),
                Stage::Auth => router.layer(from_fn_with_state(state.clone(), auth_stage)),
            })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Shared state handed to every stage.
#[derive(Clone)]
pub(crate) struct PipelineState {
    pub(crate) sessions: SessionManager,
    pub(crate) csrf: CsrfGuard,
    pub(crate) auth: AuthStateManager,
    pub(crate) static_files: ServeDir,
}

/// The pluggable parts the pipeline needs besides configuration.
#[derive(Clone)]
pub struct Collaborators {
    pub store: SharedSessionStore,
    pub serializer: Arc<dyn UserSerializer>,
}

impl Collaborators {
    /// `store` with the pass-through user serializer.
    pub fn new(store: SharedSessionStore) -> Self {
        Self {
            store,
            serializer: Arc::new(PassThroughSerializer),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn UserSerializer>) -> Self {
        self.serializer = serializer;
        self
    }
}

/// Build the application with the standard pipeline.
pub fn assemble(
    config: &AppConfig,
    collaborators: Collaborators,
    groups: RouteGroups,
) -> Result<Router, PipelineError> {
    assemble_with(config, &Pipeline::standard(), collaborators, groups)
}

/// Build the application with an explicit pipeline.
///
/// Misordered pipelines and malformed route prefixes are rejected here,
/// before any request is served. Overlapping routes between groups make
/// axum panic at this point too.
pub fn assemble_with(
    config: &AppConfig,
    pipeline: &Pipeline,
    collaborators: Collaborators,
    groups: RouteGroups,
) -> Result<Router, PipelineError> {
    pipeline.validate()?;

    let state = PipelineState {
        sessions: SessionManager::new(collaborators.store, config.session.clone()),
        csrf: CsrfGuard::new(config.csrf.clone(), config.session.secure),
        auth: AuthStateManager::new(collaborators.serializer),
        static_files: ServeDir::new(&config.static_dir).append_index_html_on_directories(false),
    };

    let router = build_router(groups)?;

    tracing::info!("Request pipeline: {:?}", pipeline.stages());

    Ok(pipeline
        .apply(router, &state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(config.runtime_mode, error_terminator)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_pipeline_is_valid() {
        let pipeline = Pipeline::standard();

        assert_eq!(
            pipeline.stages(),
            &[Stage::RequestLog, Stage::Session, Stage::Csrf, Stage::Auth]
        );
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_request_log_is_optional() {
        let pipeline = Pipeline::new(vec![Stage::Session, Stage::Csrf, Stage::Auth]);
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_missing_stage() {
        let pipeline = Pipeline::new(vec![Stage::RequestLog, Stage::Session, Stage::Auth]);
        assert_eq!(
            pipeline.validate(),
            Err(PipelineError::MissingStage(Stage::Csrf))
        );
    }

    #[test]
    fn test_duplicate_stage() {
        let pipeline = Pipeline::new(vec![
            Stage::Session,
            Stage::Csrf,
            Stage::Session,
            Stage::Auth,
        ]);
        assert_eq!(
            pipeline.validate(),
            Err(PipelineError::DuplicateStage(Stage::Session))
        );
    }

    #[test]
    fn test_out_of_order() {
        let cases = [
            (
                vec![Stage::Csrf, Stage::Session, Stage::Auth],
                Stage::Csrf,
                Stage::Session,
            ),
            (
                vec![Stage::Auth, Stage::Session, Stage::Csrf],
                Stage::Auth,
                Stage::Session,
            ),
            (
                vec![Stage::Session, Stage::Auth, Stage::Csrf],
                Stage::Auth,
                Stage::Csrf,
            ),
        ];

        for (stages, stage, required) in cases {
            assert_eq!(
                Pipeline::new(stages).validate(),
                Err(PipelineError::OutOfOrder { stage, required })
            );
        }
    }
}
