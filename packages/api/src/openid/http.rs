//! # OpenID 2.0 over HTTP
//!
//! [`HttpProvider`] relays a login attempt to the member's OpenID server and lets
//! that server vouch for the result ("dumb mode"): no associations are made and
//! no signatures are checked locally.
//!
//! ## Flow
//!
//! 1. **Discovery** — fetch the identifier page and read its
//!    `<link rel="openid2.provider">` and optional `openid2.local_id`, falling
//!    back to the 1.x `openid.server` and `openid.delegate`. An
//!    unreachable page or one without an endpoint resolves to
//!    [`Status::Missing`].
//! 2. **Begin** — redirect to the endpoint with `checkid_setup`, the `return_to`
//!    and realm, and the Simple Registration fields.
//! 3. **Complete** — map `cancel` and `error` responses directly. For `id_res`,
//!    check the `return_to` and its query arguments, rediscover the claimed
//!    identifier to make sure the asserting endpoint and local identity are the
//!    ones it names, then ask that endpoint with `check_authentication` whether
//!    it really issued the assertion. A `response_nonce` older than five minutes
//!    or already seen from that endpoint is refused. Only the registration
//!    fields covered by `openid.signed` are kept.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use url::Url;

use super::{normalize_identifier, AuthRequest, BeginOutcome, OpenIdProvider, Status, Verification};
use crate::auth::Registration;

const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
const SREG_NS: &str = "http://openid.net/extensions/sreg/1.1";
const SREG_NS_1_0: &str = "http://openid.net/sreg/1.0";

/// How far a `response_nonce` timestamp may be from our clock.
const NONCE_MAX_AGE: time::Duration = time::Duration::minutes(5);

/// Where an identifier says its OpenID server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    server: String,
    claimed_id: String,
    local_id: String,
}

/// OpenID relying party that delegates verification to the member's server.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    link_tag: Regex,
    attribute: Regex,
    /// Accepted nonces keyed by endpoint and nonce, with their timestamps.
    nonces: Arc<Mutex<HashMap<String, OffsetDateTime>>>,
}

impl HttpProvider {
    /// Create a provider with a 10 second request timeout.
    pub fn new() -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Orb")
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self {
            client,
            link_tag: Regex::new(r"(?is)<link\b[^>]*>").map_err(|e| e.to_string())?,
            attribute: Regex::new(r#"(?is)([a-z][a-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
                .map_err(|e| e.to_string())?,
            nonces: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Fetch the identifier page and read its OpenID 2.0 link tags.
    async fn discover(&self, identifier: &str) -> Option<Endpoint> {
        let response = match self.client.get(identifier).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("OpenID discovery of {} failed: {}", identifier, e);
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(
                "OpenID discovery of {} returned {}",
                identifier,
                response.status()
            );
            return None;
        }

        let claimed_id = response.url().to_string();
        let body = response.text().await.ok()?;
        let (server, local_id) = self.parse_links(&body);

        let server = server?;
        tracing::debug!("discovered OpenID server {} for {}", server, claimed_id);
        Some(Endpoint {
            local_id: local_id.unwrap_or_else(|| claimed_id.clone()),
            server,
            claimed_id,
        })
    }

    /// Extract the server and local id hrefs from HTML. The 2.0 relations win
    /// over `openid.server` and `openid.delegate`.
    fn parse_links(&self, html: &str) -> (Option<String>, Option<String>) {
        let mut server = None;
        let mut local_id = None;
        let mut legacy_server = None;
        let mut legacy_local_id = None;

        for tag in self.link_tag.find_iter(html) {
            let mut rel = None;
            let mut href = None;
            for caps in self.attribute.captures_iter(tag.as_str()) {
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().trim().to_string());
                match caps[1].to_ascii_lowercase().as_str() {
                    "rel" => rel = value,
                    "href" => href = value,
                    _ => {}
                }
            }

            let (Some(rel), Some(href)) = (rel, href) else {
                continue;
            };
            for token in rel.split_whitespace() {
                match token.to_ascii_lowercase().as_str() {
                    "openid2.provider" if server.is_none() => server = Some(href.clone()),
                    "openid2.local_id" if local_id.is_none() => local_id = Some(href.clone()),
                    "openid.server" if legacy_server.is_none() => {
                        legacy_server = Some(href.clone())
                    }
                    "openid.delegate" if legacy_local_id.is_none() => {
                        legacy_local_id = Some(href.clone())
                    }
                    _ => {}
                }
            }
        }

        (server.or(legacy_server), local_id.or(legacy_local_id))
    }

    fn checkid_setup_url(&self, endpoint: &Endpoint, request: &AuthRequest) -> Option<String> {
        let mut url = Url::parse(&endpoint.server).ok()?;
        url.query_pairs_mut()
            .append_pair("openid.ns", OPENID_NS)
            .append_pair("openid.mode", "checkid_setup")
            .append_pair("openid.claimed_id", &endpoint.claimed_id)
            .append_pair("openid.identity", &endpoint.local_id)
            .append_pair("openid.return_to", &request.return_to)
            .append_pair("openid.realm", &request.realm)
            .append_pair("openid.ns.sreg", SREG_NS)
            .append_pair("openid.sreg.required", &request.required.join(","))
            .append_pair("openid.sreg.optional", &request.optional.join(","));
        Some(url.to_string())
    }

    /// Ask the asserting server whether it issued this positive assertion.
    async fn check_authentication(
        &self,
        server: &str,
        params: &HashMap<String, String>,
    ) -> Result<bool, reqwest::Error> {
        let mut form: Vec<(&str, &str)> = params
            .iter()
            .filter(|(k, _)| k.starts_with("openid.") && k.as_str() != "openid.mode")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        form.push(("openid.mode", "check_authentication"));

        let body = self
            .client
            .post(server)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(body
            .lines()
            .filter_map(|line| line.split_once(':'))
            .any(|(key, value)| key.trim() == "is_valid" && value.trim() == "true"))
    }

    async fn verify_positive(
        &self,
        return_to: &str,
        params: &HashMap<String, String>,
    ) -> Verification {
        let failed = || Verification::new(Status::Failed);

        if !same_return_to(return_to, params.get("openid.return_to")) {
            tracing::warn!("OpenID assertion for a different return_to");
            return failed();
        }
        if !return_to_args_match(params) {
            tracing::warn!("OpenID response is missing return_to query arguments");
            return failed();
        }

        let (Some(claimed_id), Some(op_endpoint)) =
            (params.get("openid.claimed_id"), params.get("openid.op_endpoint"))
        else {
            tracing::warn!("OpenID assertion without claimed_id or op_endpoint");
            return failed();
        };

        let Some(identity_url) = normalize_identifier(claimed_id) else {
            return failed();
        };

        match self.discover(&identity_url).await {
            Some(endpoint) if endpoint.server == *op_endpoint => {
                if params.get("openid.identity") != Some(&endpoint.local_id) {
                    tracing::warn!(
                        "OpenID assertion for {} names a different local identity",
                        identity_url
                    );
                    return failed();
                }
            }
            _ => {
                tracing::warn!(
                    "{} is not the OpenID server of {}",
                    op_endpoint,
                    identity_url
                );
                return failed();
            }
        }

        match self.check_authentication(op_endpoint, params).await {
            Ok(true) => {
                let nonce = params.get("openid.response_nonce");
                if !self.accept_nonce(op_endpoint, nonce, OffsetDateTime::now_utc()) {
                    tracing::warn!("{} sent a stale or replayed response_nonce", op_endpoint);
                    return failed();
                }
                Verification::successful(identity_url, signed_registration(params))
            }
            Ok(false) => {
                tracing::warn!("{} did not confirm the assertion", op_endpoint);
                failed()
            }
            Err(e) => {
                tracing::warn!("check_authentication against {} failed: {}", op_endpoint, e);
                failed()
            }
        }
    }

    /// Record `nonce` from `server` unless it is stale or already used.
    fn accept_nonce(&self, server: &str, nonce: Option<&String>, now: OffsetDateTime) -> bool {
        let Some(nonce) = nonce else {
            return false;
        };
        let Some(issued) = nonce_time(nonce) else {
            return false;
        };
        if (now - issued).abs() > NONCE_MAX_AGE {
            return false;
        }

        let mut seen = self.nonces.lock().unwrap_or_else(PoisonError::into_inner);
        seen.retain(|_, at| now - *at <= NONCE_MAX_AGE);
        seen.insert(format!("{} {}", server, nonce), issued).is_none()
    }
}

#[async_trait]
impl OpenIdProvider for HttpProvider {
    async fn begin(&self, request: AuthRequest) -> BeginOutcome {
        let Some(endpoint) = self.discover(&request.identifier).await else {
            return BeginOutcome::Complete(Verification::new(Status::Missing));
        };

        match self.checkid_setup_url(&endpoint, &request) {
            Some(url) => BeginOutcome::Redirect(url),
            None => BeginOutcome::Complete(Verification::new(Status::Missing)),
        }
    }

    async fn complete(&self, return_to: &str, params: &HashMap<String, String>) -> Verification {
        match params.get("openid.mode").map(String::as_str) {
            Some("cancel") => Verification::new(Status::Canceled),
            Some("error") => Verification::new(Status::Other(
                params
                    .get("openid.error")
                    .cloned()
                    .unwrap_or_else(|| "The OpenID server reported an error".to_string()),
            )),
            Some("id_res") => self.verify_positive(return_to, params).await,
            Some(mode) => Verification::new(Status::Other(format!(
                "Unexpected OpenID mode: {}",
                mode
            ))),
            None => Verification::new(Status::Other(
                "The OpenID response had no mode".to_string(),
            )),
        }
    }
}

/// The asserted `return_to` must point at our own callback; its query may differ.
fn same_return_to(expected: &str, asserted: Option<&String>) -> bool {
    let (Ok(expected), Some(Ok(asserted))) =
        (Url::parse(expected), asserted.map(|a| Url::parse(a)))
    else {
        return false;
    };

    expected.scheme() == asserted.scheme()
        && expected.host_str() == asserted.host_str()
        && expected.port_or_known_default() == asserted.port_or_known_default()
        && expected.path() == asserted.path()
}

/// Every query argument of the asserted `return_to` must have come back with
/// the response unchanged.
fn return_to_args_match(params: &HashMap<String, String>) -> bool {
    let Some(Ok(return_to)) = params.get("openid.return_to").map(|r| Url::parse(r)) else {
        return false;
    };
    return_to
        .query_pairs()
        .all(|(key, value)| params.get(key.as_ref()).map(String::as_str) == Some(value.as_ref()))
}

/// The UTC timestamp that starts a `response_nonce`.
fn nonce_time(nonce: &str) -> Option<OffsetDateTime> {
    let stamp = nonce.get(..20)?;
    PrimitiveDateTime::parse(
        stamp,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

/// Registration fields the server signed, under whatever alias it chose.
fn signed_registration(params: &HashMap<String, String>) -> Registration {
    let alias = params
        .iter()
        .find(|(k, v)| k.starts_with("openid.ns.") && (*v == SREG_NS || *v == SREG_NS_1_0))
        .map(|(k, _)| k.trim_start_matches("openid.ns.").to_string())
        .unwrap_or_else(|| "sreg".to_string());

    let signed: Vec<&str> = params
        .get("openid.signed")
        .map(|s| s.split(',').map(str::trim).collect())
        .unwrap_or_default();

    let prefix = format!("{}.", alias);
    signed
        .iter()
        .filter_map(|field| field.strip_prefix(&prefix))
        .filter_map(|field| {
            params
                .get(&format!("openid.{}{}", prefix, field))
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect()
}
