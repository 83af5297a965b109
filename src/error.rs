//! Error types for the stores and the resolver

use thiserror::Error;

/// Failure reading from or writing to one of the backing stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed component data for '{unique_name}': {source}")]
    Decode {
        unique_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} out of range for '{unique_name}'")]
    OutOfRange {
        unique_name: String,
        field: &'static str,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure that aborts a whole materials resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to load wishlist for user '{user_id}'")]
    Wishlist {
        user_id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to load owned components for user '{user_id}'")]
    OwnedComponents {
        user_id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to look up wishlist items in the catalog")]
    Catalog(#[source] StoreError),

    #[error("invalid reusable marker '{marker}'")]
    InvalidMarker {
        marker: String,
        #[source]
        source: regex::Error,
    },
}
