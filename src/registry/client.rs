//! HTTP client for the Docker Registry v2 tag-list API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{LINK, WWW_AUTHENTICATE};
use serde::Deserialize;
use url::Url;

use crate::error::RegistryError;
use crate::registry::TagRegistry;
use crate::registry::auth::{BearerChallenge, TokenResponse};

/// Default registry (Docker Hub).
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com";

/// Default upper bound on followed `Link: rel="next"` pages per repository.
pub const MAX_PAGES: usize = 100;

/// Body of `GET /v2/<name>/tags/list`.
#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    #[allow(dead_code)]
    name: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Registry adapter backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    /// Base URL, always ending in `/`.
    base_url: Url,
    /// HTTP client (reused across requests).
    client: reqwest::Client,
    /// Pages read per repository before the listing is an error.
    max_pages: usize,
}

impl HttpRegistry {
    /// Create a client for the registry at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let base_url = normalize_base_url(base_url)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("browsers-configurator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Transport {
                url: base_url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url,
            client,
            max_pages: MAX_PAGES,
        })
    }

    /// Override the page limit. Values below 1 are raised to 1.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Base URL of the registry.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that the endpoint speaks the v2 API.
    ///
    /// `401` counts as reachable: it only means tag requests need a token.
    pub async fn ping(&self) -> Result<(), RegistryError> {
        let url = self.join("v2/")?;
        let response = self.send(&url, None).await?;
        let status = response.status();

        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            tracing::debug!("Registry {} answered ping with {}", self.base_url, status);
            Ok(())
        } else {
            Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    /// URL of the tag-list endpoint for `repository`.
    pub fn tags_url(&self, repository: &str) -> Result<Url, RegistryError> {
        self.join(&format!("v2/{}/tags/list", repository.trim_matches('/')))
    }

    fn join(&self, path: &str) -> Result<Url, RegistryError> {
        self.base_url
            .join(path)
            .map_err(|e| RegistryError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
    }

    async fn send(&self, url: &Url, token: Option<&str>) -> Result<reqwest::Response, RegistryError> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        request.send().await.map_err(|e| RegistryError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET with a single bearer-token retry on `401`.
    async fn get(
        &self,
        url: &Url,
        token: &mut Option<String>,
    ) -> Result<reqwest::Response, RegistryError> {
        let response = self.send(url, token.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && token.is_none()
            && let Some(challenge) = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(BearerChallenge::parse)
        {
            let fresh = self.fetch_token(&challenge).await?;
            let retried = self.send(url, Some(&fresh)).await?;
            *token = Some(fresh);
            return check_status(url, retried);
        }

        check_status(url, response)
    }

    async fn fetch_token(&self, challenge: &BearerChallenge) -> Result<String, RegistryError> {
        tracing::debug!("Requesting registry token from {}", challenge.realm);

        let response = self
            .client
            .get(&challenge.realm)
            .query(&challenge.query())
            .send()
            .await
            .map_err(|e| RegistryError::Auth {
                reason: format!("token request to {} failed: {}", challenge.realm, e),
            })?;

        if !response.status().is_success() {
            return Err(RegistryError::Auth {
                reason: format!(
                    "token endpoint {} returned status {}",
                    challenge.realm,
                    response.status()
                ),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| RegistryError::Auth {
                reason: format!("invalid token response: {e}"),
            })?
            .into_token()
            .ok_or_else(|| RegistryError::Auth {
                reason: "token endpoint returned no token".to_string(),
            })
    }
}

#[async_trait]
impl TagRegistry for HttpRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        let first = self.tags_url(repository)?;
        let mut url = first.clone();
        let mut token = None;
        let mut tags = Vec::new();

        for _ in 0..self.max_pages {
            let response = self.get(&url, &mut token).await?;
            let next = next_link(&response, &url);

            let body = response.text().await.map_err(|e| RegistryError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            let list: TagList = serde_json::from_str(&body).map_err(|e| RegistryError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            tags.extend(list.tags.unwrap_or_default());

            match next {
                Some(next) => url = next,
                None => return Ok(tags),
            }
        }

        // A truncated listing could miss the newest versions.
        tracing::warn!(
            "Tag list for '{}' exceeds {} pages",
            repository,
            self.max_pages
        );
        Err(RegistryError::TooManyPages {
            url: first.to_string(),
            pages: self.max_pages,
        })
    }
}

fn check_status(url: &Url, response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(RegistryError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}

/// Resolve the `rel="next"` target of a `Link` header against `current`.
fn next_link(response: &reqwest::Response, current: &Url) -> Option<Url> {
    let header = response.headers().get(LINK)?.to_str().ok()?;
    parse_next_link(header, current)
}

fn parse_next_link(header: &str, current: &Url) -> Option<Url> {
    header.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|p| {
            let p = p.trim();
            p.eq_ignore_ascii_case(r#"rel="next""#) || p.eq_ignore_ascii_case("rel=next")
        });
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        current.join(target).ok()
    })
}

/// Parse the base URL and make sure relative joins keep its path.
fn normalize_base_url(raw: &str) -> Result<Url, RegistryError> {
    let raw = raw.trim();
    let mut url = Url::parse(raw).map_err(|e| RegistryError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RegistryError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry(url: &str) -> HttpRegistry {
        HttpRegistry::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_tags_url() {
        let r = registry("http://127.0.0.1:5000");
        assert_eq!(
            r.tags_url("selenoid/firefox").unwrap().as_str(),
            "http://127.0.0.1:5000/v2/selenoid/firefox/tags/list"
        );
    }

    #[test]
    fn test_tags_url_keeps_base_path() {
        let r = registry("https://mirror.example.com/proxy");
        assert_eq!(r.base_url().as_str(), "https://mirror.example.com/proxy/");
        assert_eq!(
            r.tags_url("/selenoid/chrome/").unwrap().as_str(),
            "https://mirror.example.com/proxy/v2/selenoid/chrome/tags/list"
        );
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            HttpRegistry::new("not a url", Duration::from_secs(1)),
            Err(RegistryError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpRegistry::new("ftp://registry", Duration::from_secs(1)),
            Err(RegistryError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_next_link() {
        let current = Url::parse("https://registry/v2/selenoid/firefox/tags/list").unwrap();

        let next = parse_next_link(
            r#"</v2/selenoid/firefox/tags/list?last=47.0&n=100>; rel="next""#,
            &current,
        )
        .unwrap();
        assert_eq!(
            next.as_str(),
            "https://registry/v2/selenoid/firefox/tags/list?last=47.0&n=100"
        );

        assert!(parse_next_link(r#"</other>; rel="prev""#, &current).is_none());
        assert!(parse_next_link("garbage", &current).is_none());
    }

    #[test]
    fn test_tag_list_decoding() {
        let list: TagList =
            serde_json::from_str(r#"{"name":"firefox","tags":["46.0","latest"]}"#).unwrap();
        assert_eq!(list.tags.unwrap(), vec!["46.0", "latest"]);

        let list: TagList = serde_json::from_str(r#"{"name":"firefox","tags":null}"#).unwrap();
        assert!(list.tags.is_none());

        let list: TagList = serde_json::from_str(r#"{"name":"firefox"}"#).unwrap();
        assert!(list.tags.is_none());
    }
}
