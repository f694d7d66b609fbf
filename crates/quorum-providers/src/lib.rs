//! Provider adapters for external calendar accounts.
//!
//! Each provider (Google, Microsoft) implements the [`ProviderAdapter`]
//! trait: building authorization URLs, exchanging and refreshing tokens,
//! and reading and mutating the account's primary calendar. Everything
//! above this crate is provider-agnostic.

pub mod adapter;
pub mod claims;
pub mod config;
pub mod error;
pub mod google;
mod http;
pub mod microsoft;
pub mod pkce;
mod registry;

pub use adapter::{
    AuthParams, BoxFuture, EventPage, ProviderAdapter, RefreshedTokens, TokenGrant,
};
pub use claims::IdClaims;
pub use config::{GoogleSettings, MicrosoftSettings, ProvidersConfig};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use google::GoogleAdapter;
pub use microsoft::MicrosoftAdapter;
pub use registry::build_adapters;
