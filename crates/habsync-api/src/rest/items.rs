// openHAB item endpoints
//
// Catalog listing, single-item state read/write, and icon rendering.
// Item-scoped calls address the item by its `link` URL as reported in the
// catalog, not by name.

use bytes::Bytes;
use tracing::debug;

use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::models::ItemDescriptor;

impl RestClient {
    /// List the full item catalog.
    ///
    /// `GET {base}/rest/items?recursive=false`
    ///
    /// The body must be a JSON array; anything else is a deserialization
    /// error. Individual entries that lack `label`, `name` or `link` are
    /// skipped so one malformed item never hides the rest of the catalog.
    pub async fn list_items(&self) -> Result<Vec<ItemDescriptor>, Error> {
        let mut url = self.url("rest/items")?;
        url.query_pairs_mut().append_pair("recursive", "false");

        let body = self.get_text(url, "application/json").await?;

        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        let total = raw.len();
        let items: Vec<ItemDescriptor> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<ItemDescriptor>(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    debug!(error = %e, "skipping malformed item descriptor");
                    None
                }
            })
            .collect();

        debug!(total, kept = items.len(), "item catalog fetched");
        Ok(items)
    }

    /// Read the raw state string of one item.
    ///
    /// `GET {link}/state`
    pub async fn read_state(&self, link: &str) -> Result<String, Error> {
        let url = Self::state_url(link)?;
        self.get_text(url, "text/plain").await
    }

    /// Post a new state and return the state the server reports afterwards.
    ///
    /// `POST {link}` (text/plain), then `GET {link}/state`. The confirmed
    /// value may differ from `value` when the server clamps or rejects it.
    pub async fn write_state(&self, link: &str, value: &str) -> Result<String, Error> {
        let url = url::Url::parse(link)?;
        self.post_text(url, value.to_owned()).await?;
        self.read_state(link).await
    }

    /// Fetch the PNG icon for a category in a given state.
    ///
    /// `GET {base}/icon/{category}?anyFormat=true&format=png&state={state}`
    ///
    /// No category means no icon: returns empty bytes without a request.
    pub async fn fetch_icon(&self, category: Option<&str>, state: &str) -> Result<Bytes, Error> {
        let Some(category) = category.filter(|c| !c.is_empty()) else {
            return Ok(Bytes::new());
        };

        let mut url = self.url("icon/")?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push(category);
        url.query_pairs_mut()
            .append_pair("anyFormat", "true")
            .append_pair("format", "png")
            .append_pair("state", state);

        self.get_bytes(url).await
    }
}
