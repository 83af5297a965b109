//! Database schema and operations

use std::collections::{HashMap, HashSet};

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{CraftDefinition, ItemSummary, WishlistEntry};
use crate::store::{ItemCatalog, OwnedComponentRegistry, WishlistStore};

pub type Result<T> = std::result::Result<T, StoreError>;

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 100;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Catalog of craftable items and raw resources
        CREATE TABLE IF NOT EXISTS items (
            unique_name TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            image_name TEXT,
            category TEXT,
            collection TEXT NOT NULL,
            build_price INTEGER NOT NULL DEFAULT 0,
            build_quantity INTEGER NOT NULL DEFAULT 1,
            consume_on_build INTEGER NOT NULL DEFAULT 0,
            -- JSON array of component requirements, possibly with inline recipes
            components TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS wishlist_items (
            user_id TEXT NOT NULL,
            unique_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (user_id, unique_name)
        );

        -- Reusable components (blueprints) a user already has
        CREATE TABLE IF NOT EXISTS owned_components (
            user_id TEXT NOT NULL,
            unique_name TEXT NOT NULL,
            PRIMARY KEY (user_id, unique_name)
        );

        CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection);
        CREATE INDEX IF NOT EXISTS idx_items_name ON items(name);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a catalog item
pub fn upsert_item(conn: &Connection, item: &CraftDefinition, collection: &str) -> Result<()> {
    let components =
        serde_json::to_string(&item.components).map_err(|source| StoreError::Decode {
            unique_name: item.unique_name.clone(),
            source,
        })?;
    let build_price = i64::try_from(item.build_price).map_err(|_| StoreError::OutOfRange {
        unique_name: item.unique_name.clone(),
        field: "build price",
    })?;

    conn.execute(
        "INSERT OR REPLACE INTO items
            (unique_name, name, description, image_name, category, collection,
             build_price, build_quantity, consume_on_build, components)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        (
            &item.unique_name,
            &item.name,
            &item.description,
            &item.image_name,
            &item.category,
            collection,
            build_price,
            item.build_quantity,
            item.consume_on_build,
            components,
        ),
    )?;
    Ok(())
}

pub fn delete_item(conn: &Connection, unique_name: &str) -> Result<()> {
    conn.execute("DELETE FROM items WHERE unique_name = ?1", [unique_name])?;
    Ok(())
}

/// Unique names currently stored in a collection
pub fn collection_item_names(conn: &Connection, collection: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT unique_name FROM items WHERE collection = ?1")?;
    let rows = stmt.query_map([collection], |row| row.get(0))?;

    let mut results = HashSet::new();
    for row in rows {
        results.insert(row?);
    }
    Ok(results)
}

/// Clear the whole catalog (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch("DELETE FROM items;")?;
    Ok(())
}

const ITEM_COLUMNS: &str = "unique_name, name, description, image_name, category, \
     build_price, build_quantity, consume_on_build, components";

fn read_item_row(row: &Row<'_>) -> rusqlite::Result<(CraftDefinition, String)> {
    let build_price: i64 = row.get(5)?;
    Ok((
        CraftDefinition {
            unique_name: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            image_name: row.get(3)?,
            category: row.get(4)?,
            build_price: build_price.max(0) as u64,
            build_quantity: row.get(6)?,
            consume_on_build: row.get(7)?,
            components: Vec::new(),
        },
        row.get(8)?,
    ))
}

fn decode_components(mut item: CraftDefinition, components: &str) -> Result<CraftDefinition> {
    item.components = serde_json::from_str(components).map_err(|source| StoreError::Decode {
        unique_name: item.unique_name.clone(),
        source,
    })?;
    Ok(item)
}

/// Get a single catalog item by unique name
pub fn get_item(conn: &Connection, unique_name: &str) -> Result<Option<CraftDefinition>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE unique_name = ?1");
    let row = conn
        .query_row(&sql, [unique_name], read_item_row)
        .optional()?;

    match row {
        Some((item, components)) => Ok(Some(decode_components(item, &components)?)),
        None => {
            debug!(unique_name, "item not in catalog");
            Ok(None)
        }
    }
}

/// Get every listed item that exists in the catalog
pub fn get_items(
    conn: &Connection,
    unique_names: &[String],
) -> Result<HashMap<String, CraftDefinition>> {
    let mut results = HashMap::new();
    if unique_names.is_empty() {
        return Ok(results);
    }

    let placeholders = vec!["?"; unique_names.len()].join(", ");
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE unique_name IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(unique_names.iter()), read_item_row)?;

    for row in rows {
        let (item, components) = row?;
        let item = decode_components(item, &components)?;
        results.insert(item.unique_name.clone(), item);
    }

    debug!(requested = unique_names.len(), found = results.len(), "batch item lookup");
    Ok(results)
}

/// Filters for catalog searches
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub collection: Option<String>,
    pub limit: u32,
    pub offset: u32,
    /// Only items that are reusable components carrying this marker
    pub reusable_marker: Option<String>,
}

/// Case-insensitive name search over the catalog
pub fn search_items(conn: &Connection, params: &SearchParams) -> Result<Vec<ItemSummary>> {
    let limit = match params.limit {
        0 => DEFAULT_SEARCH_LIMIT,
        n => n.min(MAX_SEARCH_LIMIT),
    };

    let mut sql = String::from(
        "SELECT unique_name, name, description, category, image_name, collection FROM items WHERE 1 = 1",
    );
    let mut values: Vec<Value> = Vec::new();

    if !params.query.is_empty() {
        sql.push_str(" AND instr(lower(name), lower(?)) > 0");
        values.push(Value::Text(params.query.clone()));
    }
    if let Some(collection) = &params.collection {
        sql.push_str(" AND collection = ?");
        values.push(Value::Text(collection.clone()));
    }
    if let Some(marker) = &params.reusable_marker {
        sql.push_str(
            " AND consume_on_build = 0 \
             AND (instr(lower(name), lower(?)) > 0 OR instr(lower(unique_name), lower(?)) > 0)",
        );
        values.push(Value::Text(marker.clone()));
        values.push(Value::Text(marker.clone()));
    }
    sql.push_str(" ORDER BY name, unique_name LIMIT ? OFFSET ?");
    values.push(Value::Integer(limit as i64));
    values.push(Value::Integer(params.offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok(ItemSummary {
            unique_name: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            image_name: row.get(4)?,
            collection: row.get(5)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Insert or replace a wishlist entry, appending new items at the end
pub fn insert_wishlist_entry(conn: &Connection, user_id: &str, entry: &WishlistEntry) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO wishlist_items (user_id, unique_name, quantity, position)
         VALUES (?1, ?2, ?3,
             COALESCE((SELECT position FROM wishlist_items WHERE user_id = ?1 AND unique_name = ?2),
                      (SELECT MAX(position) + 1 FROM wishlist_items WHERE user_id = ?1),
                      0))",
        (user_id, &entry.unique_name, entry.quantity),
    )?;
    Ok(())
}

/// Get a user's wishlist in insertion order
pub fn get_wishlist(conn: &Connection, user_id: &str) -> Result<Vec<WishlistEntry>> {
    let mut stmt = conn.prepare(
        "SELECT unique_name, quantity FROM wishlist_items WHERE user_id = ?1 ORDER BY position",
    )?;

    let rows = stmt.query_map([user_id], |row| {
        Ok(WishlistEntry::new(row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn insert_owned_component(conn: &Connection, user_id: &str, unique_name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO owned_components (user_id, unique_name) VALUES (?1, ?2)",
        (user_id, unique_name),
    )?;
    Ok(())
}

pub fn get_owned_components(conn: &Connection, user_id: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT unique_name FROM owned_components WHERE user_id = ?1")?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;

    let mut results = HashSet::new();
    for row in rows {
        results.insert(row?);
    }
    Ok(results)
}

/// Remove a user's wishlist and owned components
pub fn clear_user_data(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute("DELETE FROM wishlist_items WHERE user_id = ?1", [user_id])?;
    conn.execute("DELETE FROM owned_components WHERE user_id = ?1", [user_id])?;
    Ok(())
}

impl ItemCatalog for Connection {
    fn lookup_one(&self, unique_name: &str) -> Result<Option<CraftDefinition>> {
        get_item(self, unique_name)
    }

    fn lookup_many(&self, unique_names: &[String]) -> Result<HashMap<String, CraftDefinition>> {
        get_items(self, unique_names)
    }
}

impl WishlistStore for Connection {
    fn wishlist_for_user(&self, user_id: &str) -> Result<Option<Vec<WishlistEntry>>> {
        let entries = get_wishlist(self, user_id)?;
        Ok((!entries.is_empty()).then_some(entries))
    }
}

impl OwnedComponentRegistry for Connection {
    fn owned_for_user(&self, user_id: &str) -> Result<Option<HashSet<String>>> {
        let owned = get_owned_components(self, user_id)?;
        Ok((!owned.is_empty()).then_some(owned))
    }
}
