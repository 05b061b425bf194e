// openHAB REST HTTP client
//
// Wraps `reqwest::Client` with openHAB URL construction and status
// checking. Endpoint methods (items, state, icons) live in `items.rs`
// to keep this module focused on transport mechanics.

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the openHAB REST API.
///
/// Stateless between calls: every method is a single request/response
/// exchange (or two, for confirmed writes). Cheaply cloneable -- the inner
/// `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the server root, e.g. `http://openhab.local:8080`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{path}`, tolerating a trailing slash on the base.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Build the `{link}/state` URL for an item link.
    pub(crate) fn state_url(link: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{}/state", link.trim_end_matches('/')))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and return the body as text.
    pub(crate) async fn get_text(&self, url: Url, accept: &str) -> Result<String, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(Error::Transport)?;

        let resp = check_status(resp)?;
        resp.text().await.map_err(Error::Transport)
    }

    /// Send a GET request and return the raw body bytes.
    pub(crate) async fn get_bytes(&self, url: Url) -> Result<Bytes, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        let resp = check_status(resp)?;
        resp.bytes().await.map_err(Error::Transport)
    }

    /// Send a POST request with a `text/plain` body.
    pub(crate) async fn post_text(&self, url: Url, body: String) -> Result<(), Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        check_status(resp)?;
        Ok(())
    }
}

/// Map unauthorized and non-success statuses to errors.
fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Unauthorized {
            status: status.as_u16(),
        });
    }

    if !status.is_success() {
        return Err(Error::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        });
    }

    Ok(resp)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn url_joins_without_double_slash() {
        let c = client("http://oh:8080/");
        assert_eq!(
            c.url("rest/items").unwrap().as_str(),
            "http://oh:8080/rest/items"
        );
    }

    #[test]
    fn url_keeps_base_path_prefix() {
        let c = client("https://home.example/openhab");
        assert_eq!(
            c.url("rest/items").unwrap().as_str(),
            "https://home.example/openhab/rest/items"
        );
    }

    #[test]
    fn state_url_appends_suffix() {
        let url = RestClient::state_url("http://oh:8080/rest/items/Light/").unwrap();
        assert_eq!(url.as_str(), "http://oh:8080/rest/items/Light/state");
    }

    #[test]
    fn state_url_rejects_garbage() {
        assert!(matches!(
            RestClient::state_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
