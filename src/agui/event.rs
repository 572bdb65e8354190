//! Inbound workflow events.
//!
//! Wire shape: `{ "type": "ui_render", "component": <name>, "props": {..} }`.
//! `props.stage` and `props.progress` are lifted into typed fields; the rest
//! of `props` is the widget payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::ErrorCode;

/// The only event type the dispatcher accepts.
pub const UI_RENDER: &str = "ui_render";

/// Widget payload object.
pub type Props = serde_json::Map<String, Value>;

// =============================================================================
// ERRORS
// =============================================================================

/// A malformed event. The dispatcher leaves its state untouched on any of these.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("event must be a json object")]
    NotAnObject,
    #[error("unsupported event type: {0}")]
    UnsupportedType(String),
    #[error("event has no component")]
    MissingComponent,
    #[error("props must be an object")]
    PropsNotObject,
    #[error("unknown stage: {0}")]
    UnknownStage(String),
    #[error("progress must be an integer, got {0}")]
    InvalidProgress(String),
    #[error("progress {0} outside 0..=100")]
    ProgressOutOfRange(i64),
    #[error("invalid props for {component}: {reason}")]
    InvalidPayload { component: String, reason: String },
}

impl ErrorCode for EventError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "E_INVALID_JSON",
            Self::ProgressOutOfRange(_) => "E_PROGRESS_OUT_OF_RANGE",
            Self::InvalidPayload { .. } => "E_INVALID_PAYLOAD",
            Self::NotAnObject
            | Self::UnsupportedType(_)
            | Self::MissingComponent
            | Self::PropsNotObject
            | Self::UnknownStage(_)
            | Self::InvalidProgress(_) => "E_MALFORMED_EVENT",
        }
    }
}

// =============================================================================
// STAGE
// =============================================================================

/// Coarse workflow phase reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parsing,
    Analyzing,
    Fetching,
    Processing,
    Idle,
}

impl Stage {
    /// Parse a wire stage name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "parsing" => Some(Self::Parsing),
            "analyzing" => Some(Self::Analyzing),
            "fetching" => Some(Self::Fetching),
            "processing" => Some(Self::Processing),
            "idle" => Some(Self::Idle),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Analyzing => "analyzing",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Idle => "idle",
        }
    }

    /// Human-readable caption shown under the loader. `Idle` has none.
    #[must_use]
    pub fn caption(self) -> Option<&'static str> {
        match self {
            Self::Parsing => Some("Parsing your request..."),
            Self::Analyzing => Some("Analyzing requirements..."),
            Self::Fetching => Some("Fetching vendor quotes..."),
            Self::Processing => Some("Processing your data..."),
            Self::Idle => None,
        }
    }
}

// =============================================================================
// PROGRESS
// =============================================================================

/// Percentage in `0..=100`. Out-of-range input is rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Progress(u8);

impl Progress {
    /// # Errors
    ///
    /// Returns `ProgressOutOfRange` for values below 0 or above 100.
    pub fn new(value: i64) -> Result<Self, EventError> {
        match u8::try_from(value) {
            Ok(v) if v <= 100 => Ok(Self(v)),
            _ => Err(EventError::ProgressOutOfRange(value)),
        }
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

// =============================================================================
// EVENT
// =============================================================================

/// One validated `ui_render` event.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowEvent {
    /// Component name as sent. May be unknown to the registry.
    pub component: String,
    pub stage: Option<Stage>,
    pub progress: Option<Progress>,
    pub props: Props,
}

impl WorkflowEvent {
    /// Build an event from a component name and props, lifting `stage` and
    /// `progress` out of the props.
    ///
    /// # Errors
    ///
    /// Returns an `EventError` if the component is blank, the stage is not a
    /// known stage name, or progress is not an integer in `0..=100`.
    pub fn new(component: impl Into<String>, props: Props) -> Result<Self, EventError> {
        let component = component.into();
        if component.trim().is_empty() {
            return Err(EventError::MissingComponent);
        }
        let stage = parse_stage(props.get("stage"))?;
        let progress = parse_progress(props.get("progress"))?;
        Ok(Self { component, stage, progress, props })
    }

    /// Parse the wire envelope from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an `EventError` describing the first problem found.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let Value::Object(mut envelope) = value else {
            return Err(EventError::NotAnObject);
        };

        match envelope.get("type") {
            Some(Value::String(kind)) if kind == UI_RENDER => {}
            Some(Value::String(kind)) => return Err(EventError::UnsupportedType(kind.clone())),
            Some(other) => return Err(EventError::UnsupportedType(other.to_string())),
            None => return Err(EventError::UnsupportedType("<missing>".into())),
        }

        let Some(Value::String(component)) = envelope.remove("component") else {
            return Err(EventError::MissingComponent);
        };

        let props = match envelope.remove("props") {
            None | Some(Value::Null) => Props::new(),
            Some(Value::Object(props)) => props,
            Some(_) => return Err(EventError::PropsNotObject),
        };

        Self::new(component, props)
    }

    /// Parse the wire envelope from text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidJson` for unparseable text, otherwise as `from_value`.
    pub fn parse(text: &str) -> Result<Self, EventError> {
        let value: Value = serde_json::from_str(text).map_err(|e| EventError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }
}

fn parse_stage(raw: Option<&Value>) -> Result<Option<Stage>, EventError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Stage::parse(s)
            .map(Some)
            .ok_or_else(|| EventError::UnknownStage(s.clone())),
        Some(other) => Err(EventError::UnknownStage(other.to_string())),
    }
}

fn parse_progress(raw: Option<&Value>) -> Result<Option<Progress>, EventError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                return Progress::new(v).map(Some);
            }
            if n.as_u64().is_some() {
                // Larger than i64::MAX.
                return Err(EventError::ProgressOutOfRange(i64::MAX));
            }
            Err(EventError::InvalidProgress(n.to_string()))
        }
        Some(other) => Err(EventError::InvalidProgress(other.to_string())),
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
