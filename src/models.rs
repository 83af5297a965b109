//! Data models for catalog items, wishlists and material reports

use serde::{Deserialize, Serialize};

/// One component line of a crafting recipe.
///
/// The catalog sometimes embeds the component's own recipe directly in
/// `components` instead of requiring a second lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRequirement {
    pub unique_name: String,
    #[serde(default)]
    pub name: String,
    /// Units required per parent batch
    #[serde(default)]
    pub item_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentRequirement>,
}

impl ComponentRequirement {
    pub fn has_inline_recipe(&self) -> bool {
        !self.components.is_empty()
    }
}

/// A craftable (or raw) item as stored in the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftDefinition {
    pub unique_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Credits charged for one crafting batch
    #[serde(default)]
    pub build_price: u64,
    /// Units produced per batch; zero or negative means one
    #[serde(default)]
    pub build_quantity: i64,
    #[serde(default)]
    pub consume_on_build: bool,
    #[serde(default)]
    pub components: Vec<ComponentRequirement>,
}

impl CraftDefinition {
    pub fn batch_yield(&self) -> u64 {
        if self.build_quantity <= 0 {
            1
        } else {
            self.build_quantity as u64
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.components.is_empty()
    }
}

impl From<&ComponentRequirement> for CraftDefinition {
    /// Inline recipes carry no price or yield of their own
    fn from(requirement: &ComponentRequirement) -> Self {
        CraftDefinition {
            unique_name: requirement.unique_name.clone(),
            name: requirement.name.clone(),
            description: requirement.description.clone(),
            image_name: requirement.image_name.clone(),
            components: requirement.components.clone(),
            ..Default::default()
        }
    }
}

/// Condensed catalog row returned by searches
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub unique_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistEntry {
    pub unique_name: String,
    pub quantity: u32,
}

impl WishlistEntry {
    /// Quantities below one are stored mistakes; treat them as one.
    pub fn new(unique_name: impl Into<String>, quantity: i64) -> Self {
        let quantity = quantity.clamp(1, u32::MAX as i64) as u32;
        Self {
            unique_name: unique_name.into(),
            quantity,
        }
    }
}

/// One aggregated line of a materials report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequirement {
    pub unique_name: String,
    pub name: String,
    pub total_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Everything needed to build a user's wishlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialsReport {
    pub materials: Vec<MaterialRequirement>,
    pub total_credits: u64,
}

impl MaterialsReport {
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn count_of(&self, unique_name: &str) -> Option<u64> {
        self.materials
            .iter()
            .find(|m| m.unique_name == unique_name)
            .map(|m| m.total_count)
    }
}
