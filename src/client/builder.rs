//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`WalletClient`]
//! instances.
//!
//! # Example
//!
//! ```ignore
//! use qubic_connect::{BridgeConnector, WalletClient};
//!
//! # fn example() -> qubic_connect::Result<()> {
//! let client = WalletClient::builder()
//!     .project_id("2697d5eb4d2e4ae5ca3bcdd4a4e1ebc0")
//!     .connector(BridgeConnector::new("ws://127.0.0.1:9876")?)
//!     .file_store("./session.json")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::activity::{ActivityLog, TracingLog};
use crate::error::{Error, Result};
use crate::identifiers::ChainId;
use crate::protocol::{AppMetadata, CapabilityRequest, Connector};
use crate::session::{FileSessionStore, MemorySessionStore, SessionStore};

use super::core::WalletClient;
use super::options::{ClientOptions, ParamPolicy};

// ============================================================================
// WalletClientBuilder
// ============================================================================

/// Builder for configuring a [`WalletClient`] instance.
///
/// Use [`WalletClient::builder()`] to create a new builder.
#[derive(Default)]
pub struct WalletClientBuilder {
    /// Relay project identifier.
    project_id: Option<String>,
    /// Metadata shown in the wallet.
    metadata: Option<AppMetadata>,
    /// Default chain.
    chain_id: Option<ChainId>,
    /// Capabilities requested when pairing.
    capabilities: Option<CapabilityRequest>,
    /// Deep link prefix.
    deep_link_prefix: Option<String>,
    /// Empty-field handling.
    param_policy: ParamPolicy,
    /// Protocol client constructor.
    connector: Option<Arc<dyn Connector>>,
    /// Session reference storage.
    store: Option<Arc<dyn SessionStore>>,
    /// Narration sink.
    activity_log: Option<Arc<dyn ActivityLog>>,
}

impl fmt::Debug for WalletClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletClientBuilder")
            .field("project_id", &self.project_id)
            .field("chain_id", &self.chain_id)
            .field("param_policy", &self.param_policy)
            .field("has_connector", &self.connector.is_some())
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WalletClientBuilder Implementation
// ============================================================================

impl WalletClientBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relay project identifier. Required.
    #[inline]
    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the metadata shown in the wallet's approval prompt.
    #[inline]
    #[must_use]
    pub fn metadata(mut self, metadata: AppMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the chain used when the session does not name one.
    ///
    /// Also scopes the default capability request.
    #[inline]
    #[must_use]
    pub fn chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(ChainId::new(chain_id));
        self
    }

    /// Replaces the capability request sent when pairing.
    #[inline]
    #[must_use]
    pub fn capabilities(mut self, capabilities: CapabilityRequest) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Sets the wallet deep link prefix.
    #[inline]
    #[must_use]
    pub fn deep_link_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.deep_link_prefix = Some(prefix.into());
        self
    }

    /// Sets how empty request fields are handled.
    #[inline]
    #[must_use]
    pub fn param_policy(mut self, policy: ParamPolicy) -> Self {
        self.param_policy = policy;
        self
    }

    /// Sets the protocol client constructor. Required.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets a shared protocol client constructor.
    #[inline]
    #[must_use]
    pub fn connector_arc(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the session reference store.
    #[inline]
    #[must_use]
    pub fn store(mut self, store: impl SessionStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Persists the session reference in a JSON file at `path`.
    #[inline]
    #[must_use]
    pub fn file_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = Some(Arc::new(FileSessionStore::new(path)));
        self
    }

    /// Sets the activity log sink. Defaults to `tracing`.
    #[inline]
    #[must_use]
    pub fn activity_log(mut self, log: Arc<dyn ActivityLog>) -> Self {
        self.activity_log = Some(log);
        self
    }

    /// Builds the client with validation.
    ///
    /// The client is not initialized; call [`WalletClient::initialize`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the project id or connector is missing
    /// - [`Error::Config`] if the chain id has no namespace
    pub fn build(self) -> Result<WalletClient> {
        let project_id = self.validate_project_id()?;
        let chain_id = self.validate_chain_id()?;
        let connector = self.connector.clone().ok_or_else(|| {
            Error::config(
                "Connector is required. Use .connector() to set it.\n\
                 Example: WalletClient::builder().connector(BridgeConnector::new(\"ws://127.0.0.1:9876\")?)",
            )
        })?;

        let mut options = ClientOptions::new(project_id);
        options.capabilities = self
            .capabilities
            .unwrap_or_else(|| CapabilityRequest::qubic(chain_id.clone()));
        options.chain_id = chain_id;
        options.param_policy = self.param_policy;
        if let Some(metadata) = self.metadata {
            options.init.metadata = metadata;
        }
        if let Some(prefix) = self.deep_link_prefix {
            options.deep_link_prefix = prefix;
        }

        let undeclared = options.capabilities.undeclared();
        if !undeclared.is_empty() {
            warn!(
                methods = ?undeclared.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
                "Capability request omits methods the client can dispatch"
            );
        }

        let store = self.store.unwrap_or_else(default_store);
        let log = self
            .activity_log
            .unwrap_or_else(|| Arc::new(TracingLog));

        debug!(chain = %options.chain_id, "Wallet client configured");
        Ok(WalletClient::new(options, connector, store, log))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl WalletClientBuilder {
    /// Validates the project id.
    fn validate_project_id(&self) -> Result<String> {
        let project_id = self.project_id.clone().ok_or_else(|| {
            Error::config(
                "Project id is required. Use .project_id() to set it.\n\
                 Example: WalletClient::builder().project_id(\"2697d5eb4d2e4ae5ca3bcdd4a4e1ebc0\")",
            )
        })?;

        if project_id.trim().is_empty() {
            return Err(Error::config("Project id must not be empty"));
        }

        Ok(project_id)
    }

    /// Validates the chain id.
    fn validate_chain_id(&self) -> Result<ChainId> {
        let chain_id = self.chain_id.clone().unwrap_or_default();

        if chain_id.namespace().is_empty() || !chain_id.as_str().contains(':') {
            return Err(Error::config(format!(
                "Invalid chain id: {chain_id}\n\
                 Chain ids have the form namespace:reference, e.g. qubic:main"
            )));
        }

        Ok(chain_id)
    }
}

/// File store under the user data dir, or memory when there is none.
fn default_store() -> Arc<dyn SessionStore> {
    match FileSessionStore::default_path() {
        Some(path) => {
            debug!(path = %path.display(), "Using default session store");
            Arc::new(FileSessionStore::new(path))
        }
        None => {
            warn!("No user data directory, session will not survive restarts");
            Arc::new(MemorySessionStore::new())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
