//! Wishlist bill-of-materials resolution
//!
//! Expands every wishlist item into the raw materials needed to craft it and
//! the total credits spent on crafting along the way. The walk keeps its own
//! frontier instead of recursing, so arbitrarily deep component chains only
//! cost heap space.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::models::{CraftDefinition, MaterialRequirement, MaterialsReport};
use crate::store::{ItemCatalog, OwnedComponentRegistry, WishlistStore};

pub const DEFAULT_REUSABLE_MARKER: &str = "Blueprint";

/// Display name shared by many unrelated catalog entries
const GENERIC_BLUEPRINT_NAME: &str = "Blueprint";

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Token that marks an item name or id as a reusable component
    pub reusable_marker: String,
    /// Charge the crafting price of reusable components the user already owns
    pub charge_owned_components: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            reusable_marker: DEFAULT_REUSABLE_MARKER.to_string(),
            charge_owned_components: true,
        }
    }
}

/// Decides whether an item is a reusable component.
///
/// The catalog has no explicit flag for this, so it is inferred from the
/// consumed-on-build flag plus a marker token in the name or id.
#[derive(Debug, Clone)]
pub struct ReusableClassifier {
    marker: Regex,
}

impl ReusableClassifier {
    pub fn new(marker: &str) -> Result<Self, ResolveError> {
        let marker = RegexBuilder::new(&regex::escape(marker))
            .case_insensitive(true)
            .build()
            .map_err(|source| ResolveError::InvalidMarker {
                marker: marker.to_string(),
                source,
            })?;
        Ok(Self { marker })
    }

    pub fn is_reusable(&self, item: &CraftDefinition) -> bool {
        !item.consume_on_build
            && (self.marker.is_match(&item.name) || self.marker.is_match(&item.unique_name))
    }
}

/// Resolves a user's wishlist into a materials report
pub struct BomResolver<'a, C: ?Sized, W: ?Sized, O: ?Sized> {
    catalog: &'a C,
    wishlists: &'a W,
    owned: &'a O,
    classifier: ReusableClassifier,
    charge_owned_components: bool,
}

struct MaterialInfo {
    name: String,
    image_name: Option<String>,
    description: Option<String>,
}

impl MaterialInfo {
    fn new(
        name: &str,
        image_name: &Option<String>,
        description: &Option<String>,
        parent_name: &str,
    ) -> Self {
        Self {
            name: display_name(name, parent_name),
            image_name: image_name.clone(),
            description: description.clone(),
        }
    }
}

/// Tell apart the many components literally named "Blueprint"
fn display_name(name: &str, parent_name: &str) -> String {
    if name == GENERIC_BLUEPRINT_NAME && !parent_name.is_empty() {
        format!("{GENERIC_BLUEPRINT_NAME} ({parent_name})")
    } else {
        name.to_string()
    }
}

/// Per-request counters; dropped once the report is built
struct Accumulator<'o> {
    owned: &'o HashSet<String>,
    counts: HashMap<String, u64>,
    info: HashMap<String, MaterialInfo>,
    reusable_counted: HashSet<String>,
    credits: u64,
}

impl<'o> Accumulator<'o> {
    fn new(owned: &'o HashSet<String>) -> Self {
        Self {
            owned,
            counts: HashMap::new(),
            info: HashMap::new(),
            reusable_counted: HashSet::new(),
            credits: 0,
        }
    }

    fn charge(&mut self, credits: u64) {
        self.credits = self.credits.saturating_add(credits);
    }

    /// Metadata is kept from the first time an id is seen
    fn add_material(&mut self, unique_name: &str, count: u64, info: impl FnOnce() -> MaterialInfo) {
        let total = self.counts.entry(unique_name.to_string()).or_default();
        *total = total.saturating_add(count);
        self.info.entry(unique_name.to_string()).or_insert_with(info);
    }

    fn into_report(mut self) -> MaterialsReport {
        let mut materials: Vec<MaterialRequirement> = self
            .counts
            .into_iter()
            .map(|(unique_name, total_count)| {
                let info = self.info.remove(&unique_name);
                MaterialRequirement {
                    name: info.as_ref().map(|i| i.name.clone()).unwrap_or_default(),
                    image_name: info.as_ref().and_then(|i| i.image_name.clone()),
                    description: info.and_then(|i| i.description),
                    unique_name,
                    total_count,
                }
            })
            .collect();
        materials.sort_by(|a, b| a.unique_name.cmp(&b.unique_name));

        MaterialsReport {
            materials,
            total_credits: self.credits,
        }
    }
}

/// Pending work in a single-unit expansion
enum Step {
    /// Craft `multiplier` batches of `item`
    Expand {
        item: Rc<CraftDefinition>,
        parent_name: String,
        multiplier: u64,
    },
    /// Satisfy one component line of `parent`
    Component {
        parent: Rc<CraftDefinition>,
        index: usize,
        multiplier: u64,
    },
}

impl<'a, C, W, O> BomResolver<'a, C, W, O>
where
    C: ItemCatalog + ?Sized,
    W: WishlistStore + ?Sized,
    O: OwnedComponentRegistry + ?Sized,
{
    pub fn new(
        catalog: &'a C,
        wishlists: &'a W,
        owned: &'a O,
        config: &ResolverConfig,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            catalog,
            wishlists,
            owned,
            classifier: ReusableClassifier::new(&config.reusable_marker)?,
            charge_owned_components: config.charge_owned_components,
        })
    }

    /// Compute the materials and credits needed to build a user's wishlist.
    ///
    /// Only failures loading the wishlist, the owned components or the
    /// top-level items abort; anything missing deeper in a crafting tree is
    /// treated as a raw material.
    pub fn resolve(&self, user_id: &str) -> Result<MaterialsReport, ResolveError> {
        debug!(user_id, "resolving wishlist materials");

        let entries = self
            .wishlists
            .wishlist_for_user(user_id)
            .map_err(|source| ResolveError::Wishlist {
                user_id: user_id.to_string(),
                source,
            })?
            .unwrap_or_default();

        if entries.is_empty() {
            debug!(user_id, "empty wishlist");
            return Ok(MaterialsReport::empty());
        }

        let owned = self
            .owned
            .owned_for_user(user_id)
            .map_err(|source| ResolveError::OwnedComponents {
                user_id: user_id.to_string(),
                source,
            })?
            .unwrap_or_default();
        debug!(owned = owned.len(), "loaded owned components");

        let unique_names: Vec<String> = entries.iter().map(|e| e.unique_name.clone()).collect();
        let definitions = self
            .catalog
            .lookup_many(&unique_names)
            .map_err(ResolveError::Catalog)?;

        let mut acc = Accumulator::new(&owned);
        for entry in &entries {
            let Some(definition) = definitions.get(&entry.unique_name) else {
                debug!(unique_name = %entry.unique_name, "wishlist item not in catalog, skipping");
                continue;
            };

            debug!(unique_name = %entry.unique_name, quantity = entry.quantity, "expanding wishlist item");
            let definition = Rc::new(definition.clone());
            // Each unit gets its own cycle guard so quantities multiply
            for _ in 0..entry.quantity {
                self.expand_unit(Rc::clone(&definition), &mut acc);
            }
        }

        let report = acc.into_report();
        info!(
            user_id,
            materials = report.materials.len(),
            total_credits = report.total_credits,
            "resolved wishlist materials"
        );
        Ok(report)
    }

    /// Walk one unit of `root` in the same pre-order a recursive descent would
    fn expand_unit(&self, root: Rc<CraftDefinition>, acc: &mut Accumulator<'_>) {
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier = vec![Step::Expand {
            item: root,
            parent_name: String::new(),
            multiplier: 1,
        }];

        while let Some(step) = frontier.pop() {
            match step {
                Step::Expand {
                    item,
                    parent_name,
                    multiplier,
                } => {
                    if !visited.insert(item.unique_name.clone()) {
                        debug!(unique_name = %item.unique_name, "already visited in this unit, skipping");
                        continue;
                    }

                    if item.is_leaf() {
                        self.take_leaf(&item, &parent_name, multiplier, acc);
                        continue;
                    }

                    debug!(
                        unique_name = %item.unique_name,
                        multiplier,
                        components = item.components.len(),
                        "expanding components"
                    );
                    acc.charge(item.build_price.saturating_mul(multiplier));
                    for index in (0..item.components.len()).rev() {
                        frontier.push(Step::Component {
                            parent: Rc::clone(&item),
                            index,
                            multiplier,
                        });
                    }
                }
                Step::Component {
                    parent,
                    index,
                    multiplier,
                } => {
                    if let Some(next) = self.visit_component(&parent, index, multiplier, acc) {
                        frontier.push(next);
                    }
                }
            }
        }
    }

    /// Count a component line, returning the sub-recipe to expand if it has one
    fn visit_component(
        &self,
        parent: &CraftDefinition,
        index: usize,
        multiplier: u64,
        acc: &mut Accumulator<'_>,
    ) -> Option<Step> {
        let requirement = parent.components.get(index)?;
        let needed = u64::from(requirement.item_count).saturating_mul(multiplier);

        if requirement.has_inline_recipe() {
            // The embedded recipe has no yield, the catalog entry might
            let batch_yield = match self.catalog.lookup_one(&requirement.unique_name) {
                Ok(Some(item)) => item.batch_yield(),
                Ok(None) => 1,
                Err(err) => {
                    warn!(unique_name = %requirement.unique_name, error = %err, "yield lookup failed, assuming 1");
                    1
                }
            };
            let crafts = needed.div_ceil(batch_yield);
            debug!(unique_name = %requirement.unique_name, needed, batch_yield, crafts, "inline recipe");
            return Some(Step::Expand {
                item: Rc::new(CraftDefinition::from(requirement)),
                parent_name: parent.name.clone(),
                multiplier: crafts,
            });
        }

        let found = match self.catalog.lookup_one(&requirement.unique_name) {
            Ok(found) => found,
            Err(err) => {
                warn!(unique_name = %requirement.unique_name, error = %err, "component lookup failed, treating as raw material");
                None
            }
        };

        match found {
            None => {
                debug!(unique_name = %requirement.unique_name, count = needed, "raw material");
                acc.add_material(&requirement.unique_name, needed, || {
                    MaterialInfo::new(
                        &requirement.name,
                        &requirement.image_name,
                        &requirement.description,
                        &parent.name,
                    )
                });
                None
            }
            Some(item) if item.is_leaf() => {
                self.take_leaf(&item, &parent.name, needed, acc);
                None
            }
            Some(item) => {
                let batch_yield = item.batch_yield();
                let crafts = needed.div_ceil(batch_yield);
                debug!(unique_name = %item.unique_name, needed, batch_yield, crafts, "crafted component");
                Some(Step::Expand {
                    item: Rc::new(item),
                    parent_name: parent.name.clone(),
                    multiplier: crafts,
                })
            }
        }
    }

    /// Count a catalog item with no components of its own
    fn take_leaf(
        &self,
        item: &CraftDefinition,
        parent_name: &str,
        multiplier: u64,
        acc: &mut Accumulator<'_>,
    ) {
        let cost = item.build_price.saturating_mul(multiplier);
        let info = || MaterialInfo::new(&item.name, &item.image_name, &item.description, parent_name);

        if !self.classifier.is_reusable(item) {
            debug!(unique_name = %item.unique_name, count = multiplier, "base material");
            acc.add_material(&item.unique_name, multiplier, info);
            acc.charge(cost);
            return;
        }

        if acc.owned.contains(&item.unique_name) {
            debug!(unique_name = %item.unique_name, "reusable component already owned");
            if self.charge_owned_components {
                acc.charge(cost);
            }
            return;
        }

        if acc.reusable_counted.insert(item.unique_name.clone()) {
            debug!(unique_name = %item.unique_name, "reusable component");
            acc.add_material(&item.unique_name, 1, info);
        } else {
            debug!(unique_name = %item.unique_name, "reusable component already counted");
        }
        acc.charge(cost);
    }
}

impl fmt::Display for MaterialsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Materials Summary ===")?;

        if self.materials.is_empty() {
            writeln!(f, "Nothing to build.")?;
        } else {
            writeln!(f, "Materials required:")?;
            for material in &self.materials {
                writeln!(f, "  {:>8}x {}", material.total_count, material.name)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Total credits: {}", self.total_credits)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::StoreError;
    use crate::models::{ComponentRequirement, WishlistEntry};

    #[derive(Default)]
    struct FakeCatalog {
        items: HashMap<String, CraftDefinition>,
        fail_batch: bool,
        fail_single: bool,
        single_lookups: Cell<usize>,
    }

    impl FakeCatalog {
        fn with(items: Vec<CraftDefinition>) -> Self {
            Self {
                items: items
                    .into_iter()
                    .map(|i| (i.unique_name.clone(), i))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl ItemCatalog for FakeCatalog {
        fn lookup_one(&self, unique_name: &str) -> Result<Option<CraftDefinition>, StoreError> {
            self.single_lookups.set(self.single_lookups.get() + 1);
            if self.fail_single {
                return Err(StoreError::Unavailable("catalog offline".to_string()));
            }
            Ok(self.items.get(unique_name).cloned())
        }

        fn lookup_many(
            &self,
            unique_names: &[String],
        ) -> Result<HashMap<String, CraftDefinition>, StoreError> {
            if self.fail_batch {
                return Err(StoreError::Unavailable("catalog offline".to_string()));
            }
            Ok(unique_names
                .iter()
                .filter_map(|n| self.items.get(n).map(|i| (n.clone(), i.clone())))
                .collect())
        }
    }

    struct FakeWishlist(Result<Option<Vec<WishlistEntry>>, ()>);

    impl WishlistStore for FakeWishlist {
        fn wishlist_for_user(&self, _: &str) -> Result<Option<Vec<WishlistEntry>>, StoreError> {
            self.0
                .clone()
                .map_err(|_| StoreError::Unavailable("wishlist offline".to_string()))
        }
    }

    struct FakeOwned(Result<Option<HashSet<String>>, ()>);

    impl OwnedComponentRegistry for FakeOwned {
        fn owned_for_user(&self, _: &str) -> Result<Option<HashSet<String>>, StoreError> {
            self.0
                .clone()
                .map_err(|_| StoreError::Unavailable("registry offline".to_string()))
        }
    }

    fn item(unique_name: &str, name: &str, price: u64, components: Vec<ComponentRequirement>) -> CraftDefinition {
        CraftDefinition {
            unique_name: unique_name.to_string(),
            name: name.to_string(),
            build_price: price,
            components,
            ..Default::default()
        }
    }

    fn needs(unique_name: &str, name: &str, count: u32) -> ComponentRequirement {
        ComponentRequirement {
            unique_name: unique_name.to_string(),
            name: name.to_string(),
            item_count: count,
            ..Default::default()
        }
    }

    fn wishlist(entries: &[(&str, i64)]) -> FakeWishlist {
        FakeWishlist(Ok(Some(
            entries
                .iter()
                .map(|(name, qty)| WishlistEntry::new(*name, *qty))
                .collect(),
        )))
    }

    fn nothing_owned() -> FakeOwned {
        FakeOwned(Ok(None))
    }

    fn owning(ids: &[&str]) -> FakeOwned {
        FakeOwned(Ok(Some(ids.iter().map(|s| s.to_string()).collect())))
    }

    fn resolve_with(
        catalog: &FakeCatalog,
        wishlist: &FakeWishlist,
        owned: &FakeOwned,
        config: &ResolverConfig,
    ) -> Result<MaterialsReport, ResolveError> {
        BomResolver::new(catalog, wishlist, owned, config)
            .unwrap()
            .resolve("user-123")
    }

    fn resolve(catalog: &FakeCatalog, wishlist: &FakeWishlist, owned: &FakeOwned) -> MaterialsReport {
        resolve_with(catalog, wishlist, owned, &ResolverConfig::default()).unwrap()
    }

    #[test]
    fn absent_or_empty_wishlist_gives_empty_report() {
        let catalog = FakeCatalog::default();
        let absent = FakeWishlist(Ok(None));
        let empty = FakeWishlist(Ok(Some(Vec::new())));

        assert_eq!(resolve(&catalog, &absent, &nothing_owned()), MaterialsReport::empty());
        assert_eq!(resolve(&catalog, &empty, &nothing_owned()), MaterialsReport::empty());
    }

    #[test]
    fn simple_item_without_components() {
        let catalog = FakeCatalog::with(vec![item("/Lotus/Item1", "Simple Item", 1000, vec![])]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Item1", 1)]), &nothing_owned());

        assert_eq!(report.total_credits, 1000);
        assert_eq!(report.materials.len(), 1);
        assert_eq!(report.count_of("/Lotus/Item1"), Some(1));
        assert_eq!(report.materials[0].name, "Simple Item");
    }

    #[test]
    fn leaf_item_quantity_scales_credits_and_count() {
        let catalog = FakeCatalog::with(vec![item("/Lotus/Item1", "Simple Item", 1000, vec![])]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Item1", 4)]), &nothing_owned());

        assert_eq!(report.total_credits, 4000);
        assert_eq!(report.count_of("/Lotus/Item1"), Some(4));
    }

    #[test]
    fn item_with_uncatalogued_components() {
        let catalog = FakeCatalog::with(vec![item(
            "/Lotus/Warframe",
            "Test Warframe",
            25000,
            vec![
                needs("/Lotus/Resource1", "Resource 1", 100),
                needs("/Lotus/Resource2", "Resource 2", 50),
            ],
        )]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Warframe", 1)]), &nothing_owned());

        assert_eq!(report.total_credits, 25000);
        assert_eq!(report.materials.len(), 2);
        assert_eq!(report.count_of("/Lotus/Resource1"), Some(100));
        assert_eq!(report.count_of("/Lotus/Resource2"), Some(50));
    }

    #[test]
    fn quantity_multiplies_components() {
        let catalog = FakeCatalog::with(vec![item(
            "/Lotus/Item1",
            "Simple Item",
            1000,
            vec![needs("/Lotus/Resource1", "Resource 1", 10)],
        )]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Item1", 3)]), &nothing_owned());

        assert_eq!(report.total_credits, 3000);
        assert_eq!(report.count_of("/Lotus/Resource1"), Some(30));
    }

    #[test]
    fn nested_components_add_intermediate_cost() {
        let catalog = FakeCatalog::with(vec![
            item(
                "/Lotus/Warframe",
                "Test Warframe",
                25000,
                vec![needs("/Lotus/Chassis", "Chassis", 1)],
            ),
            item(
                "/Lotus/Chassis",
                "Chassis",
                15000,
                vec![needs("/Lotus/Alloy", "Alloy Plate", 500)],
            ),
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Warframe", 1)]), &nothing_owned());

        assert_eq!(report.total_credits, 40000);
        assert_eq!(report.materials.len(), 1);
        assert_eq!(report.count_of("/Lotus/Alloy"), Some(500));
    }

    #[test]
    fn batch_yield_rounds_crafts_up() {
        let mut cell = item(
            "/Lotus/Cell",
            "Cell",
            10,
            vec![needs("/Lotus/Ore", "Ore", 2)],
        );
        cell.build_quantity = 30;
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/Reactor", "Reactor", 0, vec![needs("/Lotus/Cell", "Cell", 100)]),
            cell,
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Reactor", 1)]), &nothing_owned());

        // 100 needed at 30 per batch is 4 crafts
        assert_eq!(report.count_of("/Lotus/Ore"), Some(8));
        assert_eq!(report.total_credits, 40);
    }

    #[test]
    fn inline_recipe_uses_catalog_yield() {
        let mut inline = needs("/Lotus/Plate", "Plate", 3);
        inline.components = vec![needs("/Lotus/Ferrite", "Ferrite", 5)];
        let mut plate = item("/Lotus/Plate", "Plate", 999, vec![]);
        plate.build_quantity = 2;

        let catalog = FakeCatalog::with(vec![
            item("/Lotus/Hull", "Hull", 100, vec![inline]),
            plate,
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Hull", 1)]), &nothing_owned());

        // 3 plates at 2 per batch is 2 crafts of 5 ferrite; inline recipes carry no price
        assert_eq!(report.count_of("/Lotus/Ferrite"), Some(10));
        assert_eq!(report.total_credits, 100);
        assert_eq!(report.count_of("/Lotus/Plate"), None);
    }

    #[test]
    fn inline_recipe_without_catalog_entry_uses_yield_of_one() {
        let mut inline = needs("/Lotus/Plate", "Plate", 3);
        inline.components = vec![needs("/Lotus/Ferrite", "Ferrite", 5)];
        let catalog = FakeCatalog::with(vec![item("/Lotus/Hull", "Hull", 0, vec![inline])]);

        let report = resolve(&catalog, &wishlist(&[("/Lotus/Hull", 1)]), &nothing_owned());
        assert_eq!(report.count_of("/Lotus/Ferrite"), Some(15));
    }

    #[test]
    fn cyclic_components_terminate() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/ItemA", "Item A", 1000, vec![needs("/Lotus/ItemB", "Item B", 1)]),
            item("/Lotus/ItemB", "Item B", 500, vec![needs("/Lotus/ItemA", "Item A", 1)]),
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/ItemA", 2)]), &nothing_owned());

        assert!(report.materials.is_empty());
        assert_eq!(report.total_credits, 3000);
        assert!(catalog.single_lookups.get() < 10);
    }

    #[test]
    fn shared_raw_material_sums_across_wishlist_items() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/A", "A", 0, vec![needs("/Lotus/Ferrite", "Ferrite", 50)]),
            item("/Lotus/B", "B", 0, vec![needs("/Lotus/Ferrite", "Ferrite", 50)]),
        ]);
        let report = resolve(
            &catalog,
            &wishlist(&[("/Lotus/A", 1), ("/Lotus/B", 1)]),
            &nothing_owned(),
        );
        assert_eq!(report.count_of("/Lotus/Ferrite"), Some(100));
    }

    #[test]
    fn catalogued_raw_material_sums_within_one_tree() {
        let catalog = FakeCatalog::with(vec![
            item(
                "/Lotus/Warframe",
                "Warframe",
                0,
                vec![
                    needs("/Lotus/Chassis", "Chassis", 1),
                    needs("/Lotus/Systems", "Systems", 1),
                ],
            ),
            item("/Lotus/Chassis", "Chassis", 0, vec![needs("/Lotus/Alloy", "Alloy", 500)]),
            item("/Lotus/Systems", "Systems", 0, vec![needs("/Lotus/Alloy", "Alloy", 300)]),
            item("/Lotus/Alloy", "Alloy", 1, vec![]),
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Warframe", 1)]), &nothing_owned());

        assert_eq!(report.count_of("/Lotus/Alloy"), Some(800));
        assert_eq!(report.total_credits, 800);
    }

    #[test]
    fn reusable_component_counted_once_across_parents() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/P1", "Parent One", 100, vec![needs("/Lotus/SharedBlueprint", "Shared Blueprint", 1)]),
            item("/Lotus/P2", "Parent Two", 100, vec![needs("/Lotus/SharedBlueprint", "Shared Blueprint", 3)]),
            item("/Lotus/SharedBlueprint", "Shared Blueprint", 10, vec![]),
        ]);
        let report = resolve(
            &catalog,
            &wishlist(&[("/Lotus/P1", 2), ("/Lotus/P2", 1)]),
            &nothing_owned(),
        );

        assert_eq!(report.count_of("/Lotus/SharedBlueprint"), Some(1));
        // cost is charged on every visit: 2 * (100 + 10) + (100 + 30)
        assert_eq!(report.total_credits, 350);
    }

    #[test]
    fn reusable_top_level_item_needs_one_unit() {
        let catalog = FakeCatalog::with(vec![item("/Lotus/Recipes/MoaBlueprint", "Moa Blueprint", 500, vec![])]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Recipes/MoaBlueprint", 3)]), &nothing_owned());

        assert_eq!(report.count_of("/Lotus/Recipes/MoaBlueprint"), Some(1));
        assert_eq!(report.total_credits, 1500);
    }

    #[test]
    fn consumed_blueprint_is_not_reusable() {
        let mut consumed = item("/Lotus/OneShotBlueprint", "One Shot Blueprint", 0, vec![]);
        consumed.consume_on_build = true;
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/P1", "Parent", 0, vec![needs("/Lotus/OneShotBlueprint", "One Shot Blueprint", 2)]),
            consumed,
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/P1", 3)]), &nothing_owned());

        assert_eq!(report.count_of("/Lotus/OneShotBlueprint"), Some(6));
    }

    #[test]
    fn owned_reusable_component_is_excluded() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/Rhino", "Rhino", 25000, vec![
                needs("/Lotus/RhinoBlueprint", "Blueprint", 1),
                needs("/Lotus/Ferrite", "Ferrite", 100),
            ]),
            item("/Lotus/RhinoBlueprint", "Blueprint", 35000, vec![]),
        ]);
        let wishlist = wishlist(&[("/Lotus/Rhino", 1)]);

        let charged = resolve(&catalog, &wishlist, &owning(&["/Lotus/RhinoBlueprint"]));
        assert_eq!(charged.count_of("/Lotus/RhinoBlueprint"), None);
        assert_eq!(charged.count_of("/Lotus/Ferrite"), Some(100));
        assert_eq!(charged.total_credits, 60000);

        let config = ResolverConfig {
            charge_owned_components: false,
            ..Default::default()
        };
        let uncharged =
            resolve_with(&catalog, &wishlist, &owning(&["/Lotus/RhinoBlueprint"]), &config).unwrap();
        assert_eq!(uncharged.count_of("/Lotus/RhinoBlueprint"), None);
        assert_eq!(uncharged.total_credits, 25000);
    }

    #[test]
    fn owning_a_consumable_does_not_exclude_it() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/P1", "Parent", 0, vec![needs("/Lotus/Ferrite", "Ferrite", 100)]),
            item("/Lotus/Ferrite", "Ferrite", 0, vec![]),
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/P1", 1)]), &owning(&["/Lotus/Ferrite"]));
        assert_eq!(report.count_of("/Lotus/Ferrite"), Some(100));
    }

    #[test]
    fn custom_reusable_marker() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/P1", "Parent", 0, vec![needs("/Lotus/Schematic", "Hull Schematic", 4)]),
            item("/Lotus/Schematic", "Hull Schematic", 0, vec![]),
        ]);
        let config = ResolverConfig {
            reusable_marker: "schematic".to_string(),
            ..Default::default()
        };
        let report =
            resolve_with(&catalog, &wishlist(&[("/Lotus/P1", 2)]), &nothing_owned(), &config).unwrap();
        assert_eq!(report.count_of("/Lotus/Schematic"), Some(1));
    }

    #[test]
    fn generic_blueprint_names_get_parent_context() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/Rhino", "Rhino", 0, vec![needs("/Lotus/RhinoBlueprint", "Blueprint", 1)]),
            item("/Lotus/Excal", "Excalibur", 0, vec![needs("/Lotus/ExcalBlueprint", "Blueprint", 1)]),
            item("/Lotus/LooseBlueprint", "Blueprint", 0, vec![]),
        ]);
        let report = resolve(
            &catalog,
            &wishlist(&[("/Lotus/Rhino", 1), ("/Lotus/Excal", 1), ("/Lotus/LooseBlueprint", 1)]),
            &nothing_owned(),
        );

        let name_of = |id: &str| {
            report
                .materials
                .iter()
                .find(|m| m.unique_name == id)
                .map(|m| m.name.clone())
        };
        assert_eq!(name_of("/Lotus/RhinoBlueprint").as_deref(), Some("Blueprint (Rhino)"));
        assert_eq!(name_of("/Lotus/ExcalBlueprint").as_deref(), Some("Blueprint (Excalibur)"));
        assert_eq!(name_of("/Lotus/LooseBlueprint").as_deref(), Some("Blueprint"));
    }

    #[test]
    fn catalogued_and_inline_blueprints_get_parent_context() {
        let mut neuroptics = needs("/Lotus/Neuroptics", "Neuroptics", 1);
        neuroptics.components = vec![
            needs("/Lotus/NeuropticsBlueprint", "Blueprint", 1),
            needs("/Lotus/NeuralSensor", "Blueprint", 1),
        ];
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/Rhino", "Rhino", 0, vec![
                needs("/Lotus/RhinoBlueprint", "Rhino Blueprint", 1),
                neuroptics,
            ]),
            item("/Lotus/RhinoBlueprint", "Blueprint", 100, vec![]),
            item("/Lotus/NeuropticsBlueprint", "Blueprint", 0, vec![]),
        ]);
        let report = resolve(&catalog, &wishlist(&[("/Lotus/Rhino", 1)]), &nothing_owned());

        let name_of = |id: &str| {
            report
                .materials
                .iter()
                .find(|m| m.unique_name == id)
                .map(|m| m.name.clone())
        };
        // catalog names win over the component line's name
        assert_eq!(name_of("/Lotus/RhinoBlueprint").as_deref(), Some("Blueprint (Rhino)"));
        assert_eq!(name_of("/Lotus/NeuropticsBlueprint").as_deref(), Some("Blueprint (Neuroptics)"));
        assert_eq!(name_of("/Lotus/NeuralSensor").as_deref(), Some("Blueprint (Neuroptics)"));
        assert_eq!(report.total_credits, 100);
    }

    #[test]
    fn first_seen_metadata_wins() {
        let mut plain = needs("/Lotus/Ferrite", "Ferrite", 10);
        plain.image_name = Some("ferrite.png".to_string());
        let mut fancy = needs("/Lotus/Ferrite", "Ferrite Ore", 5);
        fancy.image_name = Some("ore.png".to_string());
        fancy.description = Some("Refined".to_string());
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/Rhino", "Rhino", 0, vec![plain, needs("/Lotus/SharedPart", "Blueprint", 1)]),
            item("/Lotus/Excal", "Excalibur", 0, vec![fancy, needs("/Lotus/SharedPart", "Blueprint", 1)]),
        ]);
        let report = resolve(
            &catalog,
            &wishlist(&[("/Lotus/Rhino", 1), ("/Lotus/Excal", 1)]),
            &nothing_owned(),
        );

        let ferrite = report.materials.iter().find(|m| m.unique_name == "/Lotus/Ferrite").unwrap();
        assert_eq!(ferrite.total_count, 15);
        assert_eq!(ferrite.name, "Ferrite");
        assert_eq!(ferrite.image_name.as_deref(), Some("ferrite.png"));
        assert_eq!(ferrite.description, None);

        let part = report.materials.iter().find(|m| m.unique_name == "/Lotus/SharedPart").unwrap();
        assert_eq!(part.name, "Blueprint (Rhino)");
        assert_eq!(part.total_count, 2);
    }

    #[test]
    fn owned_reusable_wishlist_item_is_excluded() {
        let catalog = FakeCatalog::with(vec![
            item("/Lotus/RhinoBlueprint", "Rhino Blueprint", 500, vec![]),
            item("/Lotus/Ferrite", "Ferrite", 0, vec![]),
        ]);
        let wishlist = wishlist(&[("/Lotus/RhinoBlueprint", 2), ("/Lotus/Ferrite", 3)]);
        let owned = owning(&["/Lotus/RhinoBlueprint"]);

        let charged = resolve(&catalog, &wishlist, &owned);
        assert_eq!(charged.count_of("/Lotus/RhinoBlueprint"), None);
        assert_eq!(charged.count_of("/Lotus/Ferrite"), Some(3));
        assert_eq!(charged.total_credits, 1000);

        let config = ResolverConfig {
            charge_owned_components: false,
            ..Default::default()
        };
        let uncharged = resolve_with(&catalog, &wishlist, &owned, &config).unwrap();
        assert_eq!(uncharged.count_of("/Lotus/RhinoBlueprint"), None);
        assert_eq!(uncharged.materials.len(), 1);
        assert_eq!(uncharged.total_credits, 0);
    }

    #[test]
    fn component_metadata_is_copied() {
        let mut component = needs("/Lotus/Ferrite", "Ferrite", 1);
        component.image_name = Some("ferrite.png".to_string());
        component.description = Some("Common metal".to_string());
        let catalog = FakeCatalog::with(vec![item("/Lotus/P1", "Parent", 0, vec![component])]);

        let report = resolve(&catalog, &wishlist(&[("/Lotus/P1", 1)]), &nothing_owned());
        assert_eq!(report.materials[0].image_name.as_deref(), Some("ferrite.png"));
        assert_eq!(report.materials[0].description.as_deref(), Some("Common metal"));
    }

    #[test]
    fn lookup_failures_mid_expansion_degrade_to_raw_materials() {
        let mut catalog = FakeCatalog::with(vec![
            item("/Lotus/Warframe", "Warframe", 25000, vec![needs("/Lotus/Chassis", "Chassis", 2)]),
            item("/Lotus/Chassis", "Chassis", 15000, vec![needs("/Lotus/Alloy", "Alloy", 500)]),
        ]);
        catalog.fail_single = true;

        let report = resolve(&catalog, &wishlist(&[("/Lotus/Warframe", 1)]), &nothing_owned());
        assert_eq!(report.count_of("/Lotus/Chassis"), Some(2));
        assert_eq!(report.count_of("/Lotus/Alloy"), None);
        assert_eq!(report.total_credits, 25000);
    }

    #[test]
    fn missing_top_level_item_is_skipped() {
        let catalog = FakeCatalog::with(vec![item("/Lotus/Item1", "Simple Item", 1000, vec![])]);
        let report = resolve(
            &catalog,
            &wishlist(&[("/Lotus/NonExistent", 1), ("/Lotus/Item1", 1)]),
            &nothing_owned(),
        );
        assert_eq!(report.materials.len(), 1);
        assert_eq!(report.total_credits, 1000);
    }

    #[test]
    fn store_failures_abort_resolution() {
        let catalog = FakeCatalog::with(vec![item("/Lotus/Item1", "Simple Item", 1000, vec![])]);
        let good_wishlist = wishlist(&[("/Lotus/Item1", 1)]);

        let err = resolve_with(&catalog, &FakeWishlist(Err(())), &nothing_owned(), &ResolverConfig::default())
            .unwrap_err();
        assert!(matches!(err, ResolveError::Wishlist { .. }));

        let err = resolve_with(&catalog, &good_wishlist, &FakeOwned(Err(())), &ResolverConfig::default())
            .unwrap_err();
        assert!(matches!(err, ResolveError::OwnedComponents { .. }));

        let failing = FakeCatalog {
            fail_batch: true,
            ..FakeCatalog::default()
        };
        let err = resolve_with(&failing, &good_wishlist, &nothing_owned(), &ResolverConfig::default())
            .unwrap_err();
        assert!(matches!(err, ResolveError::Catalog(_)));
    }

    #[test]
    fn deep_acyclic_chain_does_not_exhaust_the_stack() {
        const DEPTH: usize = 50_000;
        let mut items: Vec<CraftDefinition> = (0..DEPTH)
            .map(|i| {
                item(
                    &format!("/Lotus/Level{i}"),
                    &format!("Level {i}"),
                    1,
                    vec![needs(&format!("/Lotus/Level{}", i + 1), "next", 1)],
                )
            })
            .collect();
        items.push(item(&format!("/Lotus/Level{DEPTH}"), "Bottom", 0, vec![]));
        let catalog = FakeCatalog::with(items);

        let report = resolve(&catalog, &wishlist(&[("/Lotus/Level0", 1)]), &nothing_owned());
        assert_eq!(report.count_of(&format!("/Lotus/Level{DEPTH}")), Some(1));
        assert_eq!(report.total_credits, DEPTH as u64);
    }

    #[test]
    fn report_display_lists_materials_and_credits() {
        let report = MaterialsReport {
            materials: vec![MaterialRequirement {
                unique_name: "/Lotus/Alloy".to_string(),
                name: "Alloy Plate".to_string(),
                total_count: 500,
                image_name: None,
                description: None,
            }],
            total_credits: 40000,
        };
        let text = report.to_string();
        assert!(text.contains("500x Alloy Plate"));
        assert!(text.contains("Total credits: 40000"));
    }
}
