// openHAB REST wire types
//
// Raw descriptors exactly as the `/rest/items` endpoint returns them.
// `habsync-core` converts these into domain `Item`s.

use serde::{Deserialize, Serialize};

/// One entry of the `/rest/items?recursive=false` catalog.
///
/// `label`, `name` and `link` are required: entries lacking any of them
/// fail to deserialize and are skipped by [`RestClient::list_items`].
///
/// [`RestClient::list_items`]: crate::RestClient::list_items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDescriptor {
    /// Item type: `"Switch"`, `"Dimmer"`, `"Number:Temperature"`, ...
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,

    pub label: String,

    /// Stable item name, e.g. `"Kitchen_Light"`.
    pub name: String,

    /// Direct-access URL, e.g. `"http://oh:8080/rest/items/Kitchen_Light"`.
    pub link: String,

    #[serde(default)]
    pub group_names: Vec<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub state_description: Option<StateDescription>,
}

impl ItemDescriptor {
    /// First group the server reports, if any.
    pub fn primary_group(&self) -> Option<&str> {
        self.group_names.first().map(String::as_str)
    }

    /// Display pattern from the state description, if any.
    pub fn pattern(&self) -> Option<&str> {
        self.state_description
            .as_ref()
            .and_then(|d| d.pattern.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDescription {
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub read_only: bool,
}
