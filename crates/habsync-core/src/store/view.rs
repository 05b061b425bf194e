// ── Grouped catalog view ──

use serde::Serialize;

use super::registry::ItemRegistry;
use crate::model::Item;

/// Display name of the node holding ungrouped items.
pub const UNGROUPED_LABEL: &str = "Others";

/// One node of the grouped catalog tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemGroup {
    /// `None` for the ungrouped node.
    pub group: Option<String>,
    pub items: Vec<Item>,
}

impl ItemGroup {
    pub fn label(&self) -> &str {
        self.group.as_deref().unwrap_or(UNGROUPED_LABEL)
    }
}

impl ItemRegistry {
    /// Items matching `predicate`, grouped for display.
    ///
    /// One node per distinct group in first-appearance order, then a
    /// single ungrouped node last (omitted when empty). Groups with no
    /// matching item are omitted too.
    pub fn grouped(&self, predicate: impl Fn(&Item) -> bool) -> Vec<ItemGroup> {
        let mut groups: Vec<ItemGroup> = Vec::new();
        let mut ungrouped = Vec::new();

        for item in self.collect(predicate) {
            let Some(name) = item.group.clone() else {
                ungrouped.push(item);
                continue;
            };
            match groups.iter_mut().find(|g| g.group.as_ref() == Some(&name)) {
                Some(node) => node.items.push(item),
                None => groups.push(ItemGroup {
                    group: Some(name),
                    items: vec![item],
                }),
            }
        }

        if !ungrouped.is_empty() {
            groups.push(ItemGroup {
                group: None,
                items: ungrouped,
            });
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemKind;
    use pretty_assertions::assert_eq;

    fn item(id: &str, kind: ItemKind, group: Option<&str>) -> Item {
        Item {
            id: id.into(),
            link: format!("http://oh/rest/items/{id}"),
            label: id.into(),
            item_type: kind.to_string(),
            kind,
            group: group.map(Into::into),
            category: None,
            pattern: None,
            state: None,
            watched: false,
        }
    }

    fn registry() -> ItemRegistry {
        let registry = ItemRegistry::new();
        registry.load(vec![
            item("Orphan_A", ItemKind::Switch, None),
            item("Kitchen_Light", ItemKind::Switch, Some("Kitchen")),
            item("Hall_Dimmer", ItemKind::Dimmer, Some("Hall")),
            item("Kitchen_Fan", ItemKind::Switch, Some("Kitchen")),
            item("Orphan_B", ItemKind::Number, None),
        ]);
        registry
    }

    fn shape(groups: &[ItemGroup]) -> Vec<(String, Vec<String>)> {
        groups
            .iter()
            .map(|g| {
                (
                    g.label().to_owned(),
                    g.items.iter().map(|i| i.id.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn groups_in_first_appearance_order_with_ungrouped_last() {
        let groups = registry().grouped(|_| true);
        assert_eq!(
            shape(&groups),
            vec![
                ("Kitchen".into(), vec!["Kitchen_Light".into(), "Kitchen_Fan".into()]),
                ("Hall".into(), vec!["Hall_Dimmer".into()]),
                ("Others".into(), vec!["Orphan_A".into(), "Orphan_B".into()]),
            ]
        );
    }

    #[test]
    fn predicate_filters_items_and_empty_groups() {
        let groups = registry().grouped(|i| i.kind == ItemKind::Switch);
        assert_eq!(
            shape(&groups),
            vec![
                ("Kitchen".into(), vec!["Kitchen_Light".into(), "Kitchen_Fan".into()]),
                ("Others".into(), vec!["Orphan_A".into()]),
            ]
        );
    }

    #[test]
    fn no_ungrouped_node_when_all_grouped() {
        let groups = registry().grouped(|i| i.group.is_some());
        assert!(groups.iter().all(|g| g.group.is_some()));
    }
}
