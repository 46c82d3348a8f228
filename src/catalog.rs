//! Static item catalog bundled with the planner
//!
//! Maps item ids to display names and icon sprite coordinates. Icon entries
//! carry a CSS `background-position` string which is parsed into pixel offsets.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

const BUNDLED_CATALOG: &str = include_str!("../assets/catalog.json");

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RawIcon {
    id: String,
    position: String,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    items: Vec<Item>,
    #[serde(default)]
    icons: Vec<RawIcon>,
}

/// Sprite offset of an item icon within the icon sheet
#[derive(Debug, Clone, PartialEq)]
pub struct ItemIcon {
    pub x: i32,
    pub y: i32,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
    icons: HashMap<String, ItemIcon>,
}

impl Catalog {
    /// Load the catalog compiled into the binary
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CATALOG).context("Bundled item catalog is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let position_re = Regex::new(r"^\s*(-?\d+)(?:px)?\s+(-?\d+)(?:px)?\s*$")?;

        let mut icons = HashMap::new();
        for icon in raw.icons {
            match parse_position(&position_re, &icon.position) {
                Ok((x, y)) => {
                    icons.insert(
                        icon.id,
                        ItemIcon {
                            x,
                            y,
                            color: icon.color,
                        },
                    );
                }
                Err(e) => warn!(item = %icon.id, "Skipping icon: {}", e),
            }
        }

        Ok(Self {
            items: raw.items,
            icons,
        })
    }

    /// Display name for an item, or the id itself when the item is unknown
    pub fn item_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.items
            .iter()
            .find(|i| i.id == id)
            .map_or(id, |i| i.name.as_str())
    }

    pub fn item_icon(&self, id: &str) -> Option<&ItemIcon> {
        self.icons.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn valid_items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.id.as_str())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Items whose display name contains `text`, ignoring case
    pub fn search(&self, text: &str) -> Vec<&Item> {
        let needle = text.to_lowercase();
        self.items
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .collect()
    }
}

fn parse_position(re: &Regex, position: &str) -> Result<(i32, i32)> {
    let cap = re
        .captures(position)
        .ok_or_else(|| anyhow!("unrecognised icon position '{}'", position))?;
    Ok((cap[1].parse()?, cap[2].parse()?))
}
