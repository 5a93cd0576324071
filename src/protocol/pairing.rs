//! Pairing proposals and pairing URIs.
//!
//! A pairing URI has the form
//! `wc:{topic}@{version}?relay-protocol=irn&symKey={key}&expiryTimestamp={secs}`.
//! The client only inspects it for diagnostics and deep links; the wallet
//! consumes it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::Topic;
use crate::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Deep link prefix understood by the Qubic wallet.
pub const DEFAULT_DEEP_LINK_PREFIX: &str = "qubic-wallet://pairwc/";

// ============================================================================
// PairingProposal
// ============================================================================

/// A pairing URI plus the handle resolving once the wallet answers.
pub struct PairingProposal {
    /// Connection string to show or encode as QR.
    pub uri: String,
    /// Resolves with the approved session.
    pub approval: Approval,
}

impl fmt::Debug for PairingProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingProposal")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Approval
// ============================================================================

/// Single-resolution approval handle.
pub struct Approval(BoxFuture<'static, Result<Session>>);

impl Approval {
    /// Wraps any future resolving to the approved session.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Session>> + Send + 'static,
    {
        Self(future.boxed())
    }

    /// Resolves from a oneshot channel; a dropped sender counts as rejection.
    pub fn from_receiver(rx: oneshot::Receiver<Result<Session>>) -> Self {
        Self::new(async move {
            rx.await
                .unwrap_or_else(|_| Err(Error::approval_rejected("pairing was abandoned")))
        })
    }

    /// Waits for the wallet's answer.
    pub async fn wait(self) -> Result<Session> {
        self.0.await
    }
}

impl fmt::Debug for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Approval")
    }
}

// ============================================================================
// PairingUri
// ============================================================================

/// Parsed view of a `wc:` pairing URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingUri {
    /// Pairing topic.
    pub topic: Topic,
    /// Protocol version.
    pub version: u32,
    /// Relay protocol name.
    pub relay_protocol: Option<String>,
    /// Symmetric key (hex).
    pub sym_key: Option<String>,
    /// Proposal expiry, Unix seconds.
    pub expiry_timestamp: Option<u64>,
}

impl PairingUri {
    /// Parses a pairing URI.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the string is not a URI
    /// - [`Error::Protocol`] if the scheme or `topic@version` part is invalid
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;
        if url.scheme() != "wc" {
            return Err(Error::protocol(format!(
                "unexpected pairing scheme: {}",
                url.scheme()
            )));
        }

        let (topic, version) = url
            .path()
            .split_once('@')
            .ok_or_else(|| Error::protocol("pairing URI missing version"))?;
        let topic = Topic::new(topic).ok_or_else(|| Error::protocol("pairing URI missing topic"))?;
        let version = version
            .parse()
            .map_err(|_| Error::protocol(format!("invalid pairing version: {version}")))?;

        let mut parsed = Self {
            topic,
            version,
            relay_protocol: None,
            sym_key: None,
            expiry_timestamp: None,
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "relay-protocol" => parsed.relay_protocol = Some(value.into_owned()),
                "symKey" => parsed.sym_key = Some(value.into_owned()),
                "expiryTimestamp" => parsed.expiry_timestamp = value.parse().ok(),
                _ => {}
            }
        }

        Ok(parsed)
    }
}

/// Builds the wallet deep link for a pairing URI.
#[inline]
#[must_use]
pub fn deep_link(prefix: &str, uri: &str) -> String {
    format!("{prefix}{uri}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "wc:7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9@2?relay-protocol=irn&symKey=587d5484ce2a2a6ee3ba1962fdd7e8588e06200c46823bd18fbd67def96ad303&expiryTimestamp=1718000300";

    #[test]
    fn test_parse_pairing_uri() {
        let parsed = PairingUri::parse(URI).expect("parse");
        assert_eq!(parsed.version, 2);
        assert!(parsed.topic.as_str().starts_with("7f6e504b"));
        assert_eq!(parsed.relay_protocol.as_deref(), Some("irn"));
        assert!(parsed.sym_key.is_some());
        assert_eq!(parsed.expiry_timestamp, Some(1_718_000_300));
    }

    #[test]
    fn test_parse_rejects_other_scheme() {
        let err = PairingUri::parse("https://example.com").unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_version() {
        assert!(PairingUri::parse("wc:abcdef").is_err());
    }

    #[test]
    fn test_deep_link() {
        assert_eq!(
            deep_link(DEFAULT_DEEP_LINK_PREFIX, "wc:abc@2"),
            "qubic-wallet://pairwc/wc:abc@2"
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_rejects_approval() {
        let (tx, rx) = oneshot::channel();
        drop(tx);

        let err = Approval::from_receiver(rx).wait().await.unwrap_err();
        assert!(matches!(err, Error::ApprovalRejected { .. }));
    }
}
