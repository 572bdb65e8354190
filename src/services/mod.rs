//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic, persistence, and outbound
//! integrations (workflow backend, Gmail, Stripe) so route handlers stay
//! focused on protocol translation and auth plumbing.

pub mod billing;
pub mod email;
pub mod organization;
pub mod procurement;
pub mod session;
pub mod thread;
pub mod workflow;
