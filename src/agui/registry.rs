//! Component registry: component name to widget factory.
//!
//! DESIGN
//! ======
//! The set of components is closed (`ComponentName`), and the registry is
//! assembled from explicit `register` calls at startup. After `build` it is
//! read-only and shared behind an `Arc`. `resolve` is total: names with no
//! entry get the fallback factory, which only reads the `message` prop.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::event::Props;
use super::widget::{self, StatusMessage, Widget, WidgetError};

/// Builds a widget from event props.
pub type WidgetFactory = fn(&Props) -> Result<Widget, WidgetError>;

// =============================================================================
// COMPONENT NAMES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentName {
    ThinkingLoader,
    InventoryCheck,
    QuoteFetcher,
    QuoteApprovalCard,
    PaymentProcessor,
    PaymentSuccess,
    ErrorCard,
}

impl ComponentName {
    pub const ALL: [Self; 7] = [
        Self::ThinkingLoader,
        Self::InventoryCheck,
        Self::QuoteFetcher,
        Self::QuoteApprovalCard,
        Self::PaymentProcessor,
        Self::PaymentSuccess,
        Self::ErrorCard,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThinkingLoader => "thinking_loader",
            Self::InventoryCheck => "inventory_check",
            Self::QuoteFetcher => "quote_fetcher",
            Self::QuoteApprovalCard => "quote_approval_card",
            Self::PaymentProcessor => "payment_processor",
            Self::PaymentSuccess => "payment_success",
            Self::ErrorCard => "error_card",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == raw)
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// FACTORIES
// =============================================================================

fn thinking_loader(props: &Props) -> Result<Widget, WidgetError> {
    widget::decode(props).map(Widget::ThinkingLoader)
}

fn inventory_check(props: &Props) -> Result<Widget, WidgetError> {
    widget::decode(props).map(Widget::InventoryCheck)
}

fn quote_fetcher(props: &Props) -> Result<Widget, WidgetError> {
    widget::decode(props).map(Widget::QuoteFetcher)
}

fn quote_approval_card(props: &Props) -> Result<Widget, WidgetError> {
    widget::decode(props).map(Widget::QuoteApprovalCard)
}

fn payment_processor(props: &Props) -> Result<Widget, WidgetError> {
    widget::decode(props).map(Widget::PaymentProcessor)
}

fn payment_success(props: &Props) -> Result<Widget, WidgetError> {
    widget::decode(props).map(Widget::PaymentSuccess)
}

fn error_card(props: &Props) -> Result<Widget, WidgetError> {
    widget::decode(props).map(Widget::ErrorCard)
}

#[allow(clippy::unnecessary_wraps)]
fn fallback(props: &Props) -> Result<Widget, WidgetError> {
    Ok(Widget::Fallback(StatusMessage::from_props(props)))
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("component registered twice: {0}")]
    Duplicate(ComponentName),
}

/// Collects registrations. Duplicates are reported by `build`.
pub struct RegistryBuilder {
    factories: HashMap<ComponentName, WidgetFactory>,
    duplicate: Option<ComponentName>,
    fallback: WidgetFactory,
}

impl RegistryBuilder {
    #[must_use]
    pub fn register(mut self, name: ComponentName, factory: WidgetFactory) -> Self {
        if self.factories.insert(name, factory).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name);
        }
        self
    }

    /// # Errors
    ///
    /// Returns `Duplicate` if any name was registered more than once.
    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(name) = self.duplicate {
            return Err(RegistryError::Duplicate(name));
        }
        Ok(Registry { factories: self.factories, fallback: self.fallback })
    }
}

/// Immutable component registry.
pub struct Registry {
    factories: HashMap<ComponentName, WidgetFactory>,
    fallback: WidgetFactory,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder { factories: HashMap::new(), duplicate: None, fallback }
    }

    /// The procurement workflow components.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if a component is registered twice.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::builder()
            .register(ComponentName::ThinkingLoader, thinking_loader)
            .register(ComponentName::InventoryCheck, inventory_check)
            .register(ComponentName::QuoteFetcher, quote_fetcher)
            .register(ComponentName::QuoteApprovalCard, quote_approval_card)
            .register(ComponentName::PaymentProcessor, payment_processor)
            .register(ComponentName::PaymentSuccess, payment_success)
            .register(ComponentName::ErrorCard, error_card)
            .build()
    }

    /// Look up a factory. Never fails: unknown names get the fallback.
    #[must_use]
    pub fn resolve(&self, name: &str) -> WidgetFactory {
        ComponentName::parse(name)
            .and_then(|key| self.factories.get(&key).copied())
            .unwrap_or(self.fallback)
    }

    /// Whether `name` has its own entry (as opposed to the fallback).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        ComponentName::parse(name).is_some_and(|key| self.factories.contains_key(&key))
    }

    /// Registered names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<ComponentName> {
        ComponentName::ALL
            .into_iter()
            .filter(|name| self.factories.contains_key(name))
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
