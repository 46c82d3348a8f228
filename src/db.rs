//! Local durable storage
//!
//! A SQLite key-value table holding JSON records under fixed keys, one for the
//! plan and one for the custom factory types.

use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::graph::FactoryGraph;
use crate::models::FactoryType;

pub const FLOW_KEY: &str = "factoryPlannerData";
pub const CUSTOM_TYPES_KEY: &str = "customFactoryTypes";

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS storage (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;
    Ok(())
}

pub fn get_item(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM storage WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

/// Insert or overwrite a stored value
pub fn set_item(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO storage (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)",
        (key, value),
    )?;
    Ok(())
}

pub fn remove_item(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM storage WHERE key = ?1", [key])?;
    Ok(())
}

/// Read and decode a JSON record; missing or malformed records yield `None`
fn load_json<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    let Some(raw) = get_item(conn, key)? else {
        debug!(key, "no saved record");
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, "Ignoring malformed saved record: {}", e);
            Ok(None)
        }
    }
}

fn save_json<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    set_item(conn, key, &raw)
}

/// Load the saved plan, or an empty one when nothing usable is stored
///
/// The plan is repaired and re-evaluated after loading.
pub fn load_flow(conn: &Connection) -> Result<FactoryGraph> {
    let mut graph = load_json::<FactoryGraph>(conn, FLOW_KEY)?.unwrap_or_default();
    graph.refresh_all();
    debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "loaded plan"
    );
    Ok(graph)
}

pub fn save_flow(conn: &Connection, graph: &FactoryGraph) -> Result<()> {
    save_json(conn, FLOW_KEY, graph)
}

pub fn load_custom_types(conn: &Connection) -> Result<BTreeMap<String, FactoryType>> {
    Ok(load_json(conn, CUSTOM_TYPES_KEY)?.unwrap_or_default())
}

pub fn save_custom_types(conn: &Connection, types: &BTreeMap<String, FactoryType>) -> Result<()> {
    save_json(conn, CUSTOM_TYPES_KEY, types)
}

/// Clear all saved planner data
pub fn clear_saved_data(conn: &Connection) -> Result<()> {
    remove_item(conn, FLOW_KEY)?;
    remove_item(conn, CUSTOM_TYPES_KEY)?;
    Ok(())
}
