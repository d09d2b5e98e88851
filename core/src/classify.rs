//! Complaint classification through a priority-ordered provider chain.
//!
//! Each provider is tried in order; an error moves on to the next one.
//! When every provider has failed (or none is configured) the chain returns
//! a fixed fallback, so classification never fails a creation.

use crate::complaint::Priority;
use serde::{Deserialize, Serialize};

pub const FALLBACK_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub priority: Priority,
    pub summary: String,
}

pub trait ClassificationProvider: Send + Sync {
    fn name(&self) -> &str;
    fn classify(&self, title: &str, description: &str) -> anyhow::Result<Classification>;
}

#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn ClassificationProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. Earlier providers are preferred.
    pub fn with_provider(mut self, provider: Box<dyn ClassificationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn classify(&self, title: &str, description: &str) -> Classification {
        for provider in &self.providers {
            match provider.classify(title, description) {
                Ok(c) if !c.category.trim().is_empty() => {
                    log::debug!("classified by {}: {}", provider.name(), c.category);
                    return c;
                }
                Ok(_) => log::warn!("provider {} returned an empty category", provider.name()),
                Err(e) => log::warn!("provider {} failed: {e:#}", provider.name()),
            }
        }
        Self::fallback(title)
    }

    pub fn fallback(title: &str) -> Classification {
        Classification {
            category: FALLBACK_CATEGORY.to_string(),
            priority: Priority::Medium,
            summary: title.trim().to_string(),
        }
    }
}
