//! Calendar provider integrations: OAuth2 flows and API adapters.

pub mod credentials;
pub mod oauth;
pub mod providers;
