//! Anonymous bearer-token handshake for Docker Registry v2.
//!
//! Public registries such as Docker Hub answer an unauthenticated tag-list
//! request with `401` and a challenge like:
//!
//! ```text
//! WWW-Authenticate: Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:selenoid/firefox:pull"
//! ```
//!
//! The client fetches a token from `realm` and retries with it.

use serde::Deserialize;

/// A parsed `Bearer` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Token endpoint.
    pub realm: String,
    /// Service name to request the token for.
    pub service: Option<String>,
    /// Requested scope.
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parse a `WWW-Authenticate` header value.
    ///
    /// Returns `None` for non-bearer schemes or when `realm` is missing.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;

        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm.filter(|r| !r.is_empty())?,
            service,
            scope,
        })
    }

    /// Query parameters for the token request.
    pub fn query(&self) -> Vec<(&'static str, &str)> {
        let mut query = Vec::new();
        if let Some(ref service) = self.service {
            query.push(("service", service.as_str()));
        }
        if let Some(ref scope) = self.scope {
            query.push(("scope", scope.as_str()));
        }
        query
    }
}

/// Split `k="v",k2=v2` honouring commas inside quotes.
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in params.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                if let Some(pair) = split_pair(&current) {
                    out.push(pair);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if let Some(pair) = split_pair(&current) {
        out.push(pair);
    }

    out
}

fn split_pair(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=')?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((key.trim().to_string(), value.to_string()))
}

/// Token endpoint response. Docker Hub sends both fields; other registries
/// send only one of them.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_token(self) -> Option<String> {
        self.token
            .or(self.access_token)
            .filter(|t| !t.is_empty())
    }
}
