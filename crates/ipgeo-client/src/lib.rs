//! ipgeolocation.io client with two-tier response caching.

pub mod client;
pub mod error;
pub mod params;
pub mod types;

pub use client::{IpGeolocationClient, CACHE_KEY, WARM_UP_KEY};
pub use error::ClientError;
pub use params::build_geolocation_url_params;
pub use types::{GeolocationResult, ProviderError, TransportError};
