//! Read interfaces the resolver consumes
//!
//! `db` implements these for a SQLite connection; tests swap in fakes.

use std::collections::{HashMap, HashSet};

use crate::error::StoreError;
use crate::models::{CraftDefinition, WishlistEntry};

pub trait ItemCatalog {
    /// `Ok(None)` when the id is unknown
    fn lookup_one(&self, unique_name: &str) -> Result<Option<CraftDefinition>, StoreError>;

    /// Ids that are not in the catalog are simply absent from the map.
    fn lookup_many(
        &self,
        unique_names: &[String],
    ) -> Result<HashMap<String, CraftDefinition>, StoreError>;
}

pub trait WishlistStore {
    fn wishlist_for_user(&self, user_id: &str) -> Result<Option<Vec<WishlistEntry>>, StoreError>;
}

pub trait OwnedComponentRegistry {
    fn owned_for_user(&self, user_id: &str) -> Result<Option<HashSet<String>>, StoreError>;
}
