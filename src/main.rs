//! Wishlist Materials Calculator
//!
//! Works out the raw materials and credits needed to craft everything on a
//! user's wishlist.

mod db;
mod error;
mod import;
mod models;
mod resolver;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use crate::resolver::{BomResolver, DEFAULT_REUSABLE_MARKER, ResolverConfig};

#[derive(Parser)]
#[command(name = "wishlist-materials")]
#[command(about = "Bill-of-materials calculator for crafting wishlists")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "WISHLIST_DB", default_value = "wishlist.db")]
    database: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Sync the item catalog from a directory of item-data JSON files
    Import {
        /// Directory containing <Category>.json files
        data_dir: PathBuf,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Load a small sample catalog and a "demo" user for testing
    LoadSample,

    /// Show the crafting definition of an item
    Item {
        /// Item unique name
        unique_name: String,
    },

    /// Search the catalog by item name
    Search {
        /// Case-insensitive name fragment
        #[arg(default_value = "")]
        query: String,

        /// Restrict to one collection (e.g. "warframes")
        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long, default_value_t = db::DEFAULT_SEARCH_LIMIT)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Only reusable components (non-consumed blueprints)
        #[arg(long)]
        reusable: bool,
    },

    /// Show a user's wishlist
    Wishlist { user_id: String },

    /// Show the reusable components a user already owns
    Owned { user_id: String },

    /// Calculate the materials needed for a user's wishlist
    Materials {
        user_id: String,

        /// Name/id token that marks reusable components
        #[arg(long, default_value = DEFAULT_REUSABLE_MARKER)]
        reusable_marker: String,

        /// Do not charge crafting credits for reusable components already owned
        #[arg(long)]
        no_owned_cost: bool,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Import { data_dir, dry_run } => {
            if dry_run {
                println!("Dry run, no changes will be written.");
            }
            let stats = import::import_to_database(&mut conn, &data_dir, dry_run)?;
            println!("\n{}", stats);
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Item { unique_name } => match db::get_item(&conn, &unique_name)? {
            Some(item) => {
                println!("Item: {}", item.name);
                println!("  ID: {}", item.unique_name);
                println!("  Build price: {} credits", item.build_price);
                println!("  Yield per craft: {}", item.batch_yield());
                println!("  Consumed on build: {}", item.consume_on_build);
                if !item.components.is_empty() {
                    println!("  Components:");
                    for c in &item.components {
                        let nested = if c.has_inline_recipe() { " (has recipe)" } else { "" };
                        println!("    {:>6}x {}{}", c.item_count, c.name, nested);
                    }
                }
            }
            None => println!("Item '{}' not found", unique_name),
        },

        Commands::Search {
            query,
            category,
            limit,
            offset,
            reusable,
        } => {
            let params = db::SearchParams {
                query,
                collection: category,
                limit,
                offset,
                reusable_marker: reusable.then(|| DEFAULT_REUSABLE_MARKER.to_string()),
            };
            let results = db::search_items(&conn, &params)?;
            if results.is_empty() {
                println!("No matching items. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<40} {:<15} {}", "Name", "Collection", "Unique name");
                println!("{}", "-".repeat(90));
                for r in results {
                    println!("{:<40} {:<15} {}", r.name, r.collection, r.unique_name);
                }
            }
        }

        Commands::Wishlist { user_id } => {
            let entries = db::get_wishlist(&conn, &user_id)?;
            if entries.is_empty() {
                println!("Wishlist for '{}' is empty.", user_id);
            } else {
                println!("Wishlist for '{}':", user_id);
                for e in entries {
                    println!("  {:>4}x {}", e.quantity, e.unique_name);
                }
            }
        }

        Commands::Owned { user_id } => {
            let mut owned: Vec<String> = db::get_owned_components(&conn, &user_id)?
                .into_iter()
                .collect();
            owned.sort();
            if owned.is_empty() {
                println!("'{}' owns no reusable components.", user_id);
            } else {
                println!("Owned by '{}':", user_id);
                for o in owned {
                    println!("  {}", o);
                }
            }
        }

        Commands::Materials {
            user_id,
            reusable_marker,
            no_owned_cost,
            json,
        } => {
            let config = ResolverConfig {
                reusable_marker,
                charge_owned_components: !no_owned_cost,
            };
            let resolver = BomResolver::new(&conn, &conn, &conn, &config)?;
            let report = resolver.resolve(&user_id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
        }
    }

    Ok(())
}

/// Load a sample catalog and wishlist for testing without item data dumps
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::{ComponentRequirement, CraftDefinition, WishlistEntry};

    const SAMPLE_USER: &str = "demo";

    fn needs(unique_name: &str, name: &str, item_count: u32) -> ComponentRequirement {
        ComponentRequirement {
            unique_name: unique_name.to_string(),
            name: name.to_string(),
            item_count,
            ..Default::default()
        }
    }

    db::clear_catalog(conn)?;
    db::clear_user_data(conn, SAMPLE_USER)?;

    // Neuroptics embed their recipe inline
    let mut neuroptics = needs(
        "/Lotus/Types/Recipes/WarframeRecipes/RhinoHelmetBlueprint",
        "Neuroptics",
        1,
    );
    neuroptics.components = vec![
        needs("/Lotus/Types/Items/MiscItems/Alertium", "Nitain Extract", 1),
        needs("/Lotus/Types/Items/MiscItems/Rubedo", "Rubedo", 150),
    ];

    // Rhino: blueprint, two parts and a crafted resource
    let rhino = CraftDefinition {
        unique_name: "/Lotus/Powersuits/Rhino/Rhino".to_string(),
        name: "Rhino".to_string(),
        category: Some("Warframes".to_string()),
        build_price: 25000,
        build_quantity: 1,
        consume_on_build: true,
        components: vec![
            needs("/Lotus/Types/Recipes/WarframeRecipes/RhinoBlueprint", "Blueprint", 1),
            needs("/Lotus/Types/Recipes/WarframeRecipes/RhinoChassisBlueprint", "Chassis", 1),
            neuroptics,
            needs("/Lotus/Types/Items/MiscItems/OrokinCell", "Orokin Cell", 1),
        ],
        ..Default::default()
    };
    db::upsert_item(conn, &rhino, "warframes")?;

    // Reusable main blueprint
    db::upsert_item(
        conn,
        &CraftDefinition {
            unique_name: "/Lotus/Types/Recipes/WarframeRecipes/RhinoBlueprint".to_string(),
            name: "Rhino Blueprint".to_string(),
            build_price: 35000,
            ..Default::default()
        },
        "misc",
    )?;

    db::upsert_item(
        conn,
        &CraftDefinition {
            unique_name: "/Lotus/Types/Recipes/WarframeRecipes/RhinoChassisBlueprint".to_string(),
            name: "Rhino Chassis".to_string(),
            build_price: 15000,
            build_quantity: 1,
            consume_on_build: true,
            components: vec![
                needs("/Lotus/Types/Items/MiscItems/Ferrite", "Ferrite", 1000),
                needs("/Lotus/Types/Items/MiscItems/Rubedo", "Rubedo", 300),
                needs("/Lotus/Types/Items/MiscItems/AlloyPlate", "Alloy Plate", 220),
            ],
            ..Default::default()
        },
        "misc",
    )?;

    // Crafted resource produced in batches of 2
    db::upsert_item(
        conn,
        &CraftDefinition {
            unique_name: "/Lotus/Types/Items/MiscItems/OrokinCell".to_string(),
            name: "Orokin Cell".to_string(),
            build_price: 2000,
            build_quantity: 2,
            consume_on_build: true,
            components: vec![
                needs("/Lotus/Types/Items/MiscItems/Gallium", "Gallium", 1),
                needs("/Lotus/Types/Items/MiscItems/Salvage", "Salvage", 400),
            ],
            ..Default::default()
        },
        "resources",
    )?;

    for (unique_name, name) in [
        ("/Lotus/Types/Items/MiscItems/Ferrite", "Ferrite"),
        ("/Lotus/Types/Items/MiscItems/Rubedo", "Rubedo"),
        ("/Lotus/Types/Items/MiscItems/AlloyPlate", "Alloy Plate"),
        ("/Lotus/Types/Items/MiscItems/Salvage", "Salvage"),
    ] {
        db::upsert_item(
            conn,
            &CraftDefinition {
                unique_name: unique_name.to_string(),
                name: name.to_string(),
                consume_on_build: true,
                ..Default::default()
            },
            "resources",
        )?;
    }

    db::insert_wishlist_entry(conn, SAMPLE_USER, &WishlistEntry::new("/Lotus/Powersuits/Rhino/Rhino", 2))?;
    db::insert_owned_component(
        conn,
        SAMPLE_USER,
        "/Lotus/Types/Recipes/WarframeRecipes/RhinoBlueprint",
    )?;

    println!("Loaded sample catalog and wishlist for user '{}'", SAMPLE_USER);
    Ok(())
}
