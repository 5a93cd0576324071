//! Client options.
//!
//! Resolved configuration shared by the session manager and the request
//! dispatcher. Built by [`super::WalletClientBuilder`].

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::ChainId;
use crate::protocol::{AppMetadata, CapabilityRequest, DEFAULT_DEEP_LINK_PREFIX, InitConfig};

// ============================================================================
// ParamPolicy
// ============================================================================

/// Local handling of empty request fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamPolicy {
    /// Forward empty fields as `null` and let the wallet decide.
    #[default]
    Passthrough,
    /// Reject requests with empty required fields before sending.
    RequireFields,
}

// ============================================================================
// ClientOptions
// ============================================================================

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Identity handed to the protocol client.
    pub init: InitConfig,
    /// Chain requests are scoped to when the session does not name one.
    pub chain_id: ChainId,
    /// Capabilities requested when pairing.
    pub capabilities: CapabilityRequest,
    /// Prefix used to build wallet deep links.
    pub deep_link_prefix: String,
    /// Handling of empty request fields.
    pub param_policy: ParamPolicy,
}

impl ClientOptions {
    /// Options for `project_id` on the default chain with every Qubic method.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        let chain_id = ChainId::default();
        Self {
            init: InitConfig {
                project_id: project_id.into(),
                metadata: AppMetadata::default(),
            },
            capabilities: CapabilityRequest::qubic(chain_id.clone()),
            chain_id,
            deep_link_prefix: DEFAULT_DEEP_LINK_PREFIX.to_string(),
            param_policy: ParamPolicy::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new("project");
        assert_eq!(options.init.project_id, "project");
        assert_eq!(options.chain_id.as_str(), "qubic:main");
        assert_eq!(options.deep_link_prefix, "qubic-wallet://pairwc/");
        assert_eq!(options.param_policy, ParamPolicy::Passthrough);
        assert!(options.capabilities.undeclared().is_empty());
    }
}
