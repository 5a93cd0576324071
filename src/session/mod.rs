//! Session lifecycle.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionManager`] | Lifecycle state machine and sole writer of the persisted reference |
//! | [`Pairing`] | Pending pairing attempt |
//! | [`Session`] | Registry snapshot of an approved session |
//! | [`SessionStore`] | Durable `sessionTopic` storage |
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──initialize──► Initializing ──► Idle ◄──────────────┐
//!       ▲                            │            │                  │
//!       └──────── init failed ───────┘       begin_pairing    rejected/timeout
//!                                                 ▼                  │
//!                      Idle ◄── teardown ── Connected ◄─approved── Pairing
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Lifecycle manager.
pub mod manager;

/// Session data and lifecycle states.
pub mod state;

/// Persisted session reference.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use manager::{Pairing, SessionManager};
pub use state::{PairingDisplay, Session, SessionNamespace, SessionState, TeardownCause};
pub use store::{FileSessionStore, MemorySessionStore, SESSION_TOPIC_KEY, SessionStore};
