//! Capability request declared when pairing.
//!
//! The wallet authorizes exactly what is declared here. Declaring fewer
//! methods than the dispatcher calls makes those calls fail later.
//!
//! # Format
//!
//! ```json
//! {
//!   "requiredNamespaces": {
//!     "qubic": {
//!       "chains": ["qubic:main"],
//!       "methods": ["qubic_requestAccounts", "..."],
//!       "events": ["amountChanged", "assetAmountChanged", "accountsChanged"]
//!     }
//!   }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identifiers::ChainId;

use super::Method;

// ============================================================================
// Constants
// ============================================================================

/// Session events the client subscribes to by default.
pub const DEFAULT_SESSION_EVENTS: [&str; 3] =
    ["amountChanged", "assetAmountChanged", "accountsChanged"];

// ============================================================================
// CapabilityRequest
// ============================================================================

/// Namespaces, methods and events requested from the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRequest {
    /// Required namespaces keyed by namespace name.
    pub required_namespaces: BTreeMap<String, NamespaceRequest>,
}

/// Capabilities requested within one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRequest {
    /// Chains in `namespace:reference` form.
    pub chains: Vec<ChainId>,
    /// Method names.
    pub methods: Vec<String>,
    /// Session event names.
    pub events: Vec<String>,
}

impl CapabilityRequest {
    /// Every Qubic method and the default session events on `chain`.
    #[must_use]
    pub fn qubic(chain: ChainId) -> Self {
        let namespace = NamespaceRequest {
            methods: Method::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            events: DEFAULT_SESSION_EVENTS.iter().map(|e| e.to_string()).collect(),
            chains: vec![chain.clone()],
        };

        Self::default().with_namespace(chain.namespace(), namespace)
    }

    /// Adds or replaces a namespace.
    #[must_use]
    pub fn with_namespace(mut self, name: impl Into<String>, namespace: NamespaceRequest) -> Self {
        self.required_namespaces.insert(name.into(), namespace);
        self
    }

    /// Returns `true` if `method` is requested in any namespace.
    #[must_use]
    pub fn declares(&self, method: Method) -> bool {
        self.required_namespaces
            .values()
            .any(|ns| ns.methods.iter().any(|m| m == method.as_str()))
    }

    /// Returns the dispatcher methods missing from this request.
    #[must_use]
    pub fn undeclared(&self) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| !self.declares(*m))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qubic_declares_every_method() {
        let request = CapabilityRequest::qubic(ChainId::default());
        assert!(request.undeclared().is_empty());

        let ns = &request.required_namespaces["qubic"];
        assert_eq!(ns.chains, vec![ChainId::default()]);
        assert_eq!(ns.events.len(), 3);
    }

    #[test]
    fn test_undeclared_methods() {
        let request = CapabilityRequest::default().with_namespace(
            "qubic",
            NamespaceRequest {
                chains: vec![ChainId::default()],
                methods: vec!["qubic_requestAccounts".into()],
                events: Vec::new(),
            },
        );

        assert!(request.declares(Method::RequestAccounts));
        assert_eq!(request.undeclared().len(), 5);
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_value(CapabilityRequest::qubic(ChainId::default()))
            .expect("serialize");
        assert_eq!(json["requiredNamespaces"]["qubic"]["chains"][0], "qubic:main");
        assert_eq!(
            json["requiredNamespaces"]["qubic"]["methods"][1],
            "qubic_sendQubic"
        );
    }
}
