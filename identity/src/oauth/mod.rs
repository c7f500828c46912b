//! OAuth 2.0 authorization code flow.
//!
//! Providers build authorization URLs and talk to token and profile endpoints;
//! a [`Session`] carries one handshake's state across the browser redirect.

mod callback;
mod client;
mod pkce;
mod provider;
mod session;
mod user;

pub mod providers;
pub mod state;
pub mod token;

pub use callback::CallbackParams;
pub use client::{Endpoints, OAuthClient};
pub use pkce::{CodeVerifier, CHALLENGE_METHOD};
pub use provider::{PromptHint, Provider};
pub use session::Session;
pub use user::User;
