//! # identity
//!
//! The authentication core behind the front door:
//! - OAuth 2.0 provider abstraction with one flat struct per identity provider
//! - Per-handshake session capsules that survive the redirect round-trip
//! - A provider registry built once at startup
//! - The handshake orchestrator that drives begin → callback → complete
//!
//! ## Architecture
//!
//! The host application (see the `web` crate) owns the HTTP surface and the caller's
//! session storage. It only talks to this crate through [`Handshake`] and the
//! [`SessionStore`] trait:
//!
//! ```rust,ignore
//! use identity::{Handshake, MemoryStore, Registry};
//! use identity::oauth::{providers::custom, CallbackParams};
//!
//! let registry = Registry::new(vec![Arc::new(custom::Provider::new(config))]);
//! let handshake = Handshake::new(Arc::new(registry));
//!
//! let store = MemoryStore::new();
//! let url = handshake.begin(&store, "aps", None).await?;
//! // ... browser round-trip ...
//! let user = handshake.complete(&store, "aps", &params).await?;
//! ```

pub mod error;
pub mod handshake;
pub mod http;
pub mod oauth;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use handshake::{Handshake, HandshakeState};
pub use registry::Registry;
pub use store::{MemoryStore, SessionStore};
