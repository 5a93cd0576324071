//! Request dispatch.
//!
//! Every request follows the same path:
//!
//! 1. Require a live session ([`SessionManager::is_active`] is consulted, so a
//!    stale session is torn down here and the request never leaves).
//! 2. Build the envelope: method name, caller params, a `nonce` for
//!    state-mutating methods.
//! 3. Send it through the protocol client and wait for the wallet.
//! 4. Narrate the outcome and return it.
//!
//! Requests are independent: no queue, no retry, no cancellation. Two
//! requests issued together each resolve with their own result.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::activity::{render, render_pretty};
use crate::client::ParamPolicy;
use crate::error::{Error, Result};
use crate::protocol::{
    AccountsQuery, AssetTransfer, MessageRequest, Method, RequestEnvelope, RequestParams,
    SessionRequest, TransactionRequest, Transfer,
};
use crate::session::SessionManager;

// ============================================================================
// RequestDispatcher
// ============================================================================

/// Issues method calls on the active session.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    manager: SessionManager,
}

impl RequestDispatcher {
    /// Creates a dispatcher over `manager`'s session.
    #[inline]
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// Lists the wallet's accounts.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn request_accounts(&self) -> Result<Value> {
        self.dispatch(Method::RequestAccounts, &AccountsQuery {})
            .await
    }

    /// Transfers native value.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn send_qubic(&self, transfer: &Transfer) -> Result<Value> {
        self.dispatch(Method::SendQubic, transfer).await
    }

    /// Transfers an issued asset.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn send_asset(&self, transfer: &AssetTransfer) -> Result<Value> {
        self.dispatch(Method::SendAsset, transfer).await
    }

    /// Signs a transaction without broadcasting it.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<Value> {
        self.dispatch(Method::SignTransaction, tx).await
    }

    /// Signs and broadcasts a transaction. An empty payload is sent as `null`.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<Value> {
        self.dispatch(Method::SendTransaction, &tx.with_blank_payload_as_null())
            .await
    }

    /// Signs a message.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn sign_message(&self, message: &MessageRequest) -> Result<Value> {
        self.dispatch(Method::Sign, message).await
    }

    /// Sends `method` with `params` on the active session.
    ///
    /// # Errors
    ///
    /// - [`Error::InitializationFailure`] before initialization
    /// - [`Error::NoActiveSession`] without a live session; nothing is sent
    /// - [`Error::MissingField`] for empty fields under
    ///   [`ParamPolicy::RequireFields`]; nothing is sent
    /// - [`Error::RequestFailed`] if the wallet or transport rejected it
    pub async fn dispatch<P>(&self, method: Method, params: &P) -> Result<Value>
    where
        P: RequestParams + ?Sized,
    {
        let (client, session) = match self.manager.active_session() {
            Ok(active) => active,
            Err(e) => {
                warn!(%method, error = %e, "Request without an active session");
                self.manager
                    .narrate(&format!("Cannot {}. No active session.", method.action()));
                return Err(e);
            }
        };

        if self.manager.options().param_policy == ParamPolicy::RequireFields
            && let Some(field) = params.first_missing()
        {
            warn!(%method, field, "Request field is empty");
            self.manager.narrate(&format!(
                "❌ Failed to {}: {field} is required",
                method.action()
            ));
            return Err(Error::missing_field(method.as_str(), field));
        }

        if !session.allows(method) {
            warn!(%method, topic = %session.topic, "Method not approved by wallet, sending anyway");
        }

        let request = SessionRequest {
            chain_id: session
                .chain_id()
                .unwrap_or_else(|| self.manager.options().chain_id.clone()),
            topic: session.topic,
            request: RequestEnvelope::build(method, params)?,
        };
        debug!(%method, topic = %request.topic, chain = %request.chain_id, "Dispatching request");

        match client.request(request).await {
            Ok(result) => {
                info!(%method, "Request succeeded");
                self.manager.narrate(&format!("{method} response:"));
                self.manager.narrate(&render(&result));
                Ok(result)
            }
            Err(e) => {
                let err = e.into_request_failure(method.as_str());
                warn!(%method, error = %err, "Request failed");
                self.manager
                    .narrate(&format!("❌ Failed to {}", method.action()));
                match err.data() {
                    Some(data) => self.manager.narrate(&render_pretty(data)),
                    None => self.manager.narrate(&err.to_string()),
                }
                Err(err)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
