//! Authenticated client for the property management REST API.
//!
//! The client logs in with user/password, caches the bearer token for a
//! configurable TTL and retries exactly once when a request answers 401.
//! Typed wrappers cover the endpoints the agent exposes as tools; anything
//! else goes through [`ApiClient::call_endpoint`].

mod client;
mod endpoints;
mod error;
mod token_cache;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{
    extract_token, ApiClient, ClientOptions, Credentials, DEFAULT_TOKEN_FIELDS,
    DEFAULT_TOKEN_TTL, LOGIN_PATH, REQUEST_TIMEOUT, TOKEN_CACHE_KEY,
};
pub use endpoints::{query_pairs, PropertyGroupFilters, PROPERTY_GROUPS_PATH};
pub use error::{ApiError, ApiResult};
pub use token_cache::{FileTokenCache, MemoryTokenCache, NoopTokenCache, TokenCache};
