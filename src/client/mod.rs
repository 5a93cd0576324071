//! Wallet client entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WalletClient`] | Facade over the session manager and dispatcher |
//! | [`WalletClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Resolved configuration |
//! | [`ParamPolicy`] | Local handling of empty request fields |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Resolved client options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::WalletClientBuilder;
pub use core::WalletClient;
pub use options::{ClientOptions, ParamPolicy};
