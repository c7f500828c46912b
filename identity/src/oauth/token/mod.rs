//! OAuth token sets returned by a provider's token endpoint.

mod tokens;

pub use tokens::{TokenResponse, TokenSet};
