//! AGUI: workflow events to rendered UI cards.
//!
//! ARCHITECTURE
//! ============
//! The external AI workflow streams `ui_render` events. Each event names a
//! component and carries props. The pipeline is:
//!
//! ```text
//! text ──parse──▶ WorkflowEvent ──Registry::resolve──▶ Widget
//!                                                       │
//!                            Dispatcher (per session) ◀─┘
//!                                   │
//!                              RenderState ──render_html──▶ card fragment
//! ```
//!
//! DESIGN
//! ======
//! - `Registry` is built once in `main` and shared read-only via `AppState`.
//! - `Widget` is a closed sum type; each component has its own payload
//!   schema and unknown names land in `Widget::Fallback`.
//! - `Dispatcher` is owned by exactly one websocket connection. It is
//!   synchronous; suspension only happens in the transport around it.

pub mod dispatcher;
pub mod event;
pub mod registry;
pub mod render;
pub mod widget;

pub use dispatcher::{Dispatch, Dispatcher, Phase, RenderState};
pub use event::{EventError, Stage, WorkflowEvent};
pub use registry::{ComponentName, Registry};
pub use render::render_html;
