//! Event dispatcher: the per-session status pipeline.
//!
//! DESIGN
//! ======
//! A `Dispatcher` owns one session's `RenderState`. Each accepted event
//! replaces the state wholesale (last write wins; props never merge across
//! events). The visible phase is derived only from the event itself:
//!
//! ```text
//! idle ─▶ parsing ─▶ analyzing ─▶ fetching ─▶ processing ─▶ success | error
//!   (any order; each event sets the phase it carries)
//! ```
//!
//! `payment_success` and `error_card` are terminal: once rendered, further
//! events are ignored until `reset` starts a new session.
//!
//! Malformed events return an error and leave the state as it was.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::event::{EventError, Progress, Stage, WorkflowEvent};
use super::registry::Registry;
use super::widget::{ErrorCard, Widget};

// =============================================================================
// PHASE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Parsing,
    Analyzing,
    Fetching,
    Processing,
    Success,
    Error,
}

impl Phase {
    fn from_stage(stage: Option<Stage>) -> Self {
        match stage {
            None | Some(Stage::Idle) => Self::Idle,
            Some(Stage::Parsing) => Self::Parsing,
            Some(Stage::Analyzing) => Self::Analyzing,
            Some(Stage::Fetching) => Self::Fetching,
            Some(Stage::Processing) => Self::Processing,
        }
    }

    /// Terminal phases persist until the session is reset.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Analyzing => "analyzing",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

// =============================================================================
// RENDER STATE
// =============================================================================

/// What the session currently shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderState {
    /// Component name as sent by the workflow (unknown names included).
    pub component: String,
    pub phase: Phase,
    pub stage: Option<Stage>,
    pub caption: Option<&'static str>,
    pub progress: Option<Progress>,
    pub widget: Widget,
}

impl RenderState {
    /// Resolve and build the state for a single event. Pure.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if the props do not fit the component's schema.
    pub fn from_event(registry: &Registry, event: WorkflowEvent) -> Result<Self, EventError> {
        if !registry.contains(&event.component) {
            debug!(component = %event.component, "agui: unknown component, using fallback");
        }
        let factory = registry.resolve(&event.component);
        let widget = factory(&event.props).map_err(|e| EventError::InvalidPayload {
            component: event.component.clone(),
            reason: e.to_string(),
        })?;

        let phase = match widget {
            Widget::PaymentSuccess(_) => Phase::Success,
            Widget::ErrorCard(_) => Phase::Error,
            _ => Phase::from_stage(event.stage),
        };

        Ok(Self {
            component: event.component,
            phase,
            stage: event.stage,
            caption: event.stage.and_then(Stage::caption),
            progress: event.progress,
            widget,
        })
    }

    /// Error card state for a collaborator failure.
    #[must_use]
    pub fn failure(message: impl Into<String>, code: Option<&str>, retryable: bool) -> Self {
        Self {
            component: "error_card".into(),
            phase: Phase::Error,
            stage: None,
            caption: None,
            progress: None,
            widget: Widget::ErrorCard(ErrorCard {
                message: Some(message.into()),
                code: code.map(str::to_owned),
                retryable,
            }),
        }
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

/// Result of feeding one event. The state itself is read via `Dispatcher::state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The event replaced the state.
    Rendered,
    /// The session is terminal; the event was dropped.
    Ignored,
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    session_id: Uuid,
    state: Option<RenderState>,
    applied: u64,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry, session_id: Uuid::new_v4(), state: None, applied: 0 }
    }

    /// Identifies the current session. Changes on `reset`.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn state(&self) -> Option<&RenderState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.as_ref().map_or(Phase::Idle, |s| s.phase)
    }

    /// Events rendered in this session.
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if the props do not fit the component; the
    /// current state is kept.
    pub fn on_event(&mut self, event: WorkflowEvent) -> Result<Dispatch, EventError> {
        if self.phase().is_terminal() {
            debug!(session_id = %self.session_id, component = %event.component, "agui: session terminal, event ignored");
            return Ok(Dispatch::Ignored);
        }

        let next = RenderState::from_event(&self.registry, event)?;
        self.state = Some(next);
        self.applied += 1;
        Ok(Dispatch::Rendered)
    }

    /// Parse and apply one wire event.
    ///
    /// # Errors
    ///
    /// Returns the parse or payload error; the current state is kept.
    pub fn on_text(&mut self, text: &str) -> Result<Dispatch, EventError> {
        let event = WorkflowEvent::parse(text)?;
        self.on_event(event)
    }

    /// Render a collaborator failure as the terminal error card.
    pub fn fail(&mut self, message: impl Into<String>, code: Option<&str>, retryable: bool) -> &RenderState {
        self.state.insert(RenderState::failure(message, code, retryable))
    }

    /// Begin a new session: fresh id, nothing rendered.
    pub fn reset(&mut self) -> Uuid {
        self.session_id = Uuid::new_v4();
        self.state = None;
        self.applied = 0;
        self.session_id
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
