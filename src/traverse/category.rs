//! Category → product → leaf walk for portal-style vendor sites.

use std::collections::HashSet;
use std::hash::Hash;

use async_trait::async_trait;
use tracing::Instrument;

use super::{cap_reached, CatalogNode, LeafCandidate, NodeKind, WalkStats};
use crate::error::ExpansionError;
use crate::record::FirmwareRecord;
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase, Scrape};

/// Vendor-specific expansion steps of a portal. Implementations own the
/// session for the duration of the walk; the walk calls them strictly in
/// traversal order, extracting a product's leaves before expanding the next.
#[async_trait]
pub trait PortalCatalog: Send {
    type Category: Send + Sync;
    /// Product identity; a product listed under several categories is expanded once.
    type Product: Send + Sync + Eq + Hash + Clone;
    type Leaf: Send;

    async fn categories(&mut self) -> Result<Vec<CatalogNode<Self::Category>>, ExpansionError>;

    async fn products(&mut self, category: &CatalogNode<Self::Category>) -> Result<Vec<CatalogNode<Self::Product>>, ExpansionError>;

    /// Firmware items of one product. `Ok(vec![])` means the product is not eligible.
    async fn leaves(&mut self, product: &CatalogNode<Self::Product>) -> Result<Vec<Self::Leaf>, ExpansionError>;

    /// Build the record for one leaf; `None` when the item could not be read at all.
    async fn extract(&mut self, leaf: LeafCandidate<Self::Leaf>) -> Option<FirmwareRecord>;
}

/// Walk the whole portal. `cap` bounds the number of emitted records; once
/// reached, nothing further is expanded. Repeated products are skipped.
pub async fn walk_portal<C: PortalCatalog>(
    catalog: &mut C,
    cap: Option<usize>,
    log: &LogCtx<Scrape>,
) -> (Vec<FirmwareRecord>, WalkStats) {
    let mut stats = WalkStats::default();
    let mut records = Vec::new();
    let mut expanded: HashSet<C::Product> = HashSet::new();

    let categories = match catalog.categories().instrument(log.span(&Phase::Discover)).await {
        Ok(c) => c,
        Err(e) => {
            stats.expansion_failures += 1;
            log.warn(e.to_string());
            return (records, stats);
        }
    };
    log.info(format!("found {} categories", categories.len()));

    'categories: for category in categories.iter().filter(|c| c.kind != NodeKind::Skip) {
        if cap_reached(cap, records.len()) { break; }
        stats.categories += 1;

        let span = log.span_kv(&Phase::Expand, [("category", category.label.clone())]);
        let products = match catalog.products(category).instrument(span).await {
            Ok(p) => p,
            Err(e) => {
                stats.expansion_failures += 1;
                log.warn(e.to_string());
                continue;
            }
        };
        log.debug_kv("category expanded", [("category", category.label.clone()), ("products", products.len().to_string())]);

        for product in &products {
            if cap_reached(cap, records.len()) { break 'categories; }
            if product.kind == NodeKind::Skip {
                stats.skipped_items += 1;
                log.info(format!("skipping {}", product.label));
                continue;
            }

            if !expanded.insert(product.handle.clone()) {
                stats.skipped_items += 1;
                log.debug(format!("{} already visited under another category", product.label));
                continue;
            }

            let span = log.span_kv(&Phase::Expand, [("product", product.label.clone())]);
            let items = match catalog.leaves(product).instrument(span).await {
                Ok(items) => items,
                Err(e) => {
                    stats.expansion_failures += 1;
                    log.warn(e.to_string());
                    continue;
                }
            };
            if items.is_empty() {
                stats.skipped_items += 1;
                log.info(format!("no firmware offered for {}", product.label));
                continue;
            }

            for item in items {
                if cap_reached(cap, records.len()) { break 'categories; }
                stats.leaves += 1;
                let leaf = LeafCandidate { path: vec![category.label.clone(), product.label.clone()], item };
                match catalog.extract(leaf).instrument(log.span(&Phase::Extract)).await {
                    Some(record) => records.push(record),
                    None => {
                        stats.skipped_items += 1;
                        log.warn(format!("could not read firmware item of {}", product.label));
                    }
                }
            }
        }
    }

    (records, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tree = Vec<(&'static str, Option<Vec<(&'static str, Vec<&'static str>)>>)>;

    /// In-memory portal: category label → products → firmware versions.
    /// Products are identified by label, so one product may sit in several categories.
    struct MockPortal {
        tree: Tree,
        expanded: Vec<String>,
        product_visits: Vec<String>,
    }

    impl MockPortal {
        fn new(tree: Tree) -> Self {
            Self { tree, expanded: Vec::new(), product_visits: Vec::new() }
        }
    }

    fn node<H>(handle: H, label: &str, parent: Option<&str>) -> CatalogNode<H> {
        CatalogNode { handle, label: label.to_string(), kind: NodeKind::Container, parent: parent.map(str::to_string) }
    }

    #[async_trait]
    impl PortalCatalog for MockPortal {
        type Category = usize;
        type Product = &'static str;
        type Leaf = &'static str;

        async fn categories(&mut self) -> Result<Vec<CatalogNode<usize>>, ExpansionError> {
            Ok(self.tree.iter().enumerate().map(|(i, (label, _))| node(i, label, None)).collect())
        }

        async fn products(&mut self, category: &CatalogNode<usize>) -> Result<Vec<CatalogNode<&'static str>>, ExpansionError> {
            self.expanded.push(category.label.clone());
            let (_, products) = &self.tree[category.handle];
            let products = products.as_ref().ok_or_else(|| ExpansionError::new(category.label.clone(), "selector mismatch"))?;
            Ok(products.iter().map(|(label, _)| node(*label, label, Some(category.label.as_str()))).collect())
        }

        async fn leaves(&mut self, product: &CatalogNode<&'static str>) -> Result<Vec<&'static str>, ExpansionError> {
            self.product_visits.push(product.label.clone());
            let versions = self
                .tree
                .iter()
                .filter_map(|(_, products)| products.as_ref())
                .flatten()
                .find(|(label, _)| *label == product.handle)
                .map(|(_, versions)| versions.clone())
                .unwrap_or_default();
            Ok(versions)
        }

        async fn extract(&mut self, leaf: LeafCandidate<&'static str>) -> Option<FirmwareRecord> {
            if leaf.item == "unreadable" { return None; }
            let mut rec = FirmwareRecord::new("Mock").unwrap();
            rec.product_type = leaf.path.first().cloned();
            rec.product_name = leaf.path.get(1).cloned();
            rec.version = Some(leaf.item.to_string());
            Some(rec)
        }
    }

    fn portal() -> MockPortal {
        MockPortal::new(vec![
            ("Routers", Some(vec![("R1", vec!["1.0", "1.1"]), ("R2", vec!["2.0"])])),
            ("Broken", None),
            ("Switches", Some(vec![("S1", vec![]), ("S2", vec!["3.0", "unreadable"])])),
        ])
    }

    #[tokio::test]
    async fn failed_category_does_not_affect_siblings() {
        let log = crate::telemetry::scrape();
        let mut p = portal();
        let (records, stats) = walk_portal(&mut p, None, &log).await;
        let versions: Vec<&str> = records.iter().filter_map(|r| r.version.as_deref()).collect();
        assert_eq!(versions, vec!["1.0", "1.1", "2.0", "3.0"]);
        assert_eq!(records[3].product_type.as_deref(), Some("Switches"));
        assert_eq!(records[3].product_name.as_deref(), Some("S2"));
        assert_eq!(stats.categories, 3);
        assert_eq!(stats.expansion_failures, 1);
        // S1 offers nothing, one S2 item is unreadable
        assert_eq!(stats.skipped_items, 2);
        assert_eq!(stats.leaves, 5);
    }

    #[tokio::test]
    async fn cap_counts_records_and_stops_expansion() {
        let log = crate::telemetry::scrape();
        let mut p = portal();
        let (records, _) = walk_portal(&mut p, Some(2), &log).await;
        assert_eq!(records.len(), 2);
        assert_eq!(p.expanded, vec!["Routers".to_string()]);
    }

    #[tokio::test]
    async fn same_catalog_gives_same_records() {
        let log = crate::telemetry::scrape();
        let (a, _) = walk_portal(&mut portal(), None, &log).await;
        let (b, _) = walk_portal(&mut portal(), None, &log).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn product_in_two_categories_is_visited_once() {
        let log = crate::telemetry::scrape();
        let mut p = MockPortal::new(vec![
            ("Wi-Fi Routers", Some(vec![("Archer C7", vec!["V5_230512"])])),
            ("Deco", Some(vec![("Archer C7", vec!["V5_230512"]), ("Deco M5", vec!["1.6.2"])])),
        ]);
        let (records, stats) = walk_portal(&mut p, None, &log).await;
        assert_eq!(p.product_visits, vec!["Archer C7".to_string(), "Deco M5".to_string()]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].product_type.as_deref(), Some("Wi-Fi Routers"));
        assert_eq!(stats.skipped_items, 1);
        assert_eq!(stats.leaves, 2);
    }
}
