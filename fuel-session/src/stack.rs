use crate::assertion;
use crate::config::StackConfig;
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// The static set of stacks this process serves, in registration order.
#[derive(Debug, Clone)]
pub struct StackRegistry {
    stacks: Vec<Arc<StackConfig>>,
}

impl StackRegistry {
    /// Build a registry, keeping the given order as the registration order.
    pub fn new(stacks: impl IntoIterator<Item = StackConfig>) -> Result<Self> {
        let stacks: Vec<Arc<StackConfig>> = stacks.into_iter().map(Arc::new).collect();
        if stacks.is_empty() {
            return Err(Error::Configuration(
                "at least one stack must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for stack in &stacks {
            if !seen.insert(stack.key.as_str()) {
                return Err(Error::Configuration(format!(
                    "duplicate stack key: {}",
                    stack.key
                )));
            }
        }

        Ok(Self { stacks })
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<StackConfig>> {
        self.stacks.iter()
    }

    pub fn resolve_by_key(&self, key: &str) -> Option<Arc<StackConfig>> {
        self.stacks.iter().find(|s| s.key == key).cloned()
    }

    /// Find the stack whose secret verifies `assertion`.
    ///
    /// Each stack's secret is tried in registration order and the first one
    /// that verifies wins, so a lookup costs one HMAC check per configured
    /// stack in the worst case. Returns the stack with the decoded claims.
    pub fn resolve_by_signature(&self, assertion: &str) -> Option<(Arc<StackConfig>, Value)> {
        self.first_verified(|stack| {
            match assertion::verify_with_secret(assertion, &stack.app_signature) {
                Ok(claims) => Some(claims),
                Err(e) => {
                    tracing::debug!(stack = %stack.key, error = %e, "assertion not verified by stack");
                    None
                }
            }
        })
    }

    pub fn resolve_by_base_url(&self, base_url: &str) -> Option<Arc<StackConfig>> {
        self.stacks.iter().find(|s| s.base_url == base_url).cloned()
    }

    fn first_verified<F>(&self, mut verify: F) -> Option<(Arc<StackConfig>, Value)>
    where
        F: FnMut(&StackConfig) -> Option<Value>,
    {
        self.stacks
            .iter()
            .find_map(|stack| verify(stack.as_ref()).map(|claims| (stack.clone(), claims)))
    }
}
