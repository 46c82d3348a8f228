//! Built-in and user-authored factory types

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::info;

use crate::catalog::Catalog;
use crate::models::{FactoryType, ResourceIO};

/// Built-in factory presets
pub fn presets() -> Vec<FactoryType> {
    vec![
        FactoryType {
            id: "steel".to_string(),
            name: "Steel Factory".to_string(),
            inputs: vec![ResourceIO::new("iron-ore", "Iron Ore", 120.0)],
            outputs: vec![
                ResourceIO::new("steel-pipe", "Steel Pipe", 80.0),
                ResourceIO::new("steel-beam", "Steel Beam", 10.0),
            ],
        },
        FactoryType {
            id: "copper".to_string(),
            name: "Copper Factory".to_string(),
            inputs: vec![ResourceIO::new("copper-ore", "Copper Ore", 60.0)],
            outputs: vec![
                ResourceIO::new("copper-wire", "Copper Wire", 120.0),
                ResourceIO::new("copper-sheet", "Copper Sheet", 20.0),
            ],
        },
    ]
}

/// Presets merged with custom types; custom entries win on id clashes
#[derive(Debug, Clone)]
pub struct FactoryTypeRegistry {
    presets: Vec<FactoryType>,
    custom: BTreeMap<String, FactoryType>,
}

impl Default for FactoryTypeRegistry {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl FactoryTypeRegistry {
    pub fn new(custom: BTreeMap<String, FactoryType>) -> Self {
        Self {
            presets: presets(),
            custom,
        }
    }

    pub fn get(&self, id: &str) -> Option<&FactoryType> {
        self.custom
            .get(id)
            .or_else(|| self.presets.iter().find(|t| t.id == id))
    }

    /// Presets first, then custom types
    ///
    /// A custom override of a preset keeps the preset's position.
    pub fn list(&self) -> Vec<&FactoryType> {
        self.presets
            .iter()
            .map(|t| self.custom.get(&t.id).unwrap_or(t))
            .chain(
                self.custom
                    .values()
                    .filter(|t| !self.presets.iter().any(|p| p.id == t.id)),
            )
            .collect()
    }

    pub fn is_custom(&self, id: &str) -> bool {
        self.custom.contains_key(id)
    }

    pub fn save_custom(&mut self, factory_type: FactoryType) {
        info!(factory_type = %factory_type.id, "saved factory type");
        self.custom.insert(factory_type.id.clone(), factory_type);
    }

    pub fn remove_custom(&mut self, id: &str) -> Option<FactoryType> {
        self.custom.remove(id)
    }

    pub fn custom(&self) -> &BTreeMap<String, FactoryType> {
        &self.custom
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("factory type needs a name")]
    MissingName,

    #[error("{side} #{index} has no item selected")]
    MissingItem { side: Side, index: usize },

    #[error("{side} #{index} has a negative rate")]
    NegativeRate { side: Side, index: usize },

    #[error("{side} #{index} does not exist")]
    NoSuchEntry { side: Side, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Input => write!(f, "input"),
            Side::Output => write!(f, "output"),
        }
    }
}

/// Editable factory type: a name plus two ordered port lists
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryTypeDraft {
    id: String,
    pub name: String,
    pub inputs: Vec<ResourceIO>,
    pub outputs: Vec<ResourceIO>,
}

impl Default for FactoryTypeDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryTypeDraft {
    /// Start a blank type with a fresh `custom-<millis>` id
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self::with_id(format!("custom-{millis}"))
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Start from an existing type, keeping its id
    pub fn edit(existing: &FactoryType) -> Self {
        Self {
            id: existing.id.clone(),
            name: existing.name.clone(),
            inputs: existing.inputs.clone(),
            outputs: existing.outputs.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    fn list_mut(&mut self, side: Side) -> &mut Vec<ResourceIO> {
        match side {
            Side::Input => &mut self.inputs,
            Side::Output => &mut self.outputs,
        }
    }

    fn entry_mut(&mut self, side: Side, index: usize) -> Result<&mut ResourceIO, DraftError> {
        self.list_mut(side)
            .get_mut(index)
            .ok_or(DraftError::NoSuchEntry { side, index })
    }

    /// Append a blank entry and return its index
    pub fn add(&mut self, side: Side) -> usize {
        let list = self.list_mut(side);
        list.push(ResourceIO::new("", "", 0.0));
        list.len() - 1
    }

    pub fn add_input(&mut self) -> usize {
        self.add(Side::Input)
    }

    pub fn add_output(&mut self) -> usize {
        self.add(Side::Output)
    }

    /// Pick the item for an entry; its display name comes from the catalog
    pub fn set_item(
        &mut self,
        side: Side,
        index: usize,
        item_id: &str,
        catalog: &Catalog,
    ) -> Result<(), DraftError> {
        let entry = self.entry_mut(side, index)?;
        entry.id = item_id.to_string();
        entry.name = catalog.item_name(item_id).to_string();
        Ok(())
    }

    pub fn set_rate(&mut self, side: Side, index: usize, rate: f64) -> Result<(), DraftError> {
        self.entry_mut(side, index)?.rate = rate;
        Ok(())
    }

    pub fn remove(&mut self, side: Side, index: usize) -> Result<ResourceIO, DraftError> {
        let list = self.list_mut(side);
        if index >= list.len() {
            return Err(DraftError::NoSuchEntry { side, index });
        }
        Ok(list.remove(index))
    }

    /// Validate the draft and turn it into a factory type
    pub fn finish(self) -> Result<FactoryType, DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::MissingName);
        }
        for (side, list) in [(Side::Input, &self.inputs), (Side::Output, &self.outputs)] {
            for (index, entry) in list.iter().enumerate() {
                if entry.id.trim().is_empty() {
                    return Err(DraftError::MissingItem { side, index });
                }
                if entry.rate < 0.0 || entry.rate.is_nan() {
                    return Err(DraftError::NegativeRate { side, index });
                }
            }
        }

        Ok(FactoryType {
            id: self.id,
            name: self.name.trim().to_string(),
            inputs: self.inputs,
            outputs: self.outputs,
        })
    }
}
