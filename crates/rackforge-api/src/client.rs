// Hand-crafted async HTTP client for the NetBox REST API.
//
// Base path: /api/
// Auth: `Authorization: Token <token>` header

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::kind::ResourceKind;
use crate::record::Record;
use crate::{Error, TransportConfig};

/// Page size for list requests; the backend caps pages, so list calls
/// walk `offset` until `count` is exhausted.
const PAGE_LIMIT: i64 = 100;

// ── List envelope ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListResponse {
    count: i64,
    #[serde(default)]
    #[allow(dead_code)]
    next: Option<String>,
    results: Vec<Record>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for a NetBox backend.
///
/// One instance per backend; cheap to clone is not required since the
/// reconciler borrows it for the whole run.
pub struct NetBoxClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NetBoxClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a base URL and API token.
    ///
    /// Injects `Authorization: Token ...` as a default header on every
    /// request. The base path is normalized to end in `/api/`.
    pub fn new(
        base_url: &str,
        token: &secrecy::SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth_value =
            HeaderValue::from_str(&format!("Token {}", token.expose_secret()))
                .map_err(|_| Error::InvalidToken)?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Normalize the base URL so it always ends with `/api/`.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }

        Ok(url)
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn kind_url(&self, kind: ResourceKind) -> Url {
        // base_url always ends with `/api/`, so joining `dcim/…` works.
        self.base_url
            .join(kind.path())
            .expect("kind path should be a valid relative URL")
    }

    fn object_url(&self, kind: ResourceKind, id: i64) -> Url {
        self.base_url
            .join(&format!("{}{id}/", kind.path()))
            .expect("object path should be a valid relative URL")
    }

    // ── Read operations ──────────────────────────────────────────────

    /// All objects of `kind` matching the filter params, across pages.
    pub async fn filter(
        &self,
        kind: ResourceKind,
        params: &[(&str, String)],
    ) -> Result<Vec<Record>, Error> {
        let mut all = Vec::new();
        let mut offset: i64 = 0;

        loop {
            let url = self.kind_url(kind);
            debug!("GET {url} params={params:?} offset={offset}");

            let resp = self
                .http
                .get(url)
                .query(params)
                .query(&[("limit", PAGE_LIMIT.to_string()), ("offset", offset.to_string())])
                .send()
                .await?;
            let page: ListResponse = self.handle_response(resp).await?;

            let received = i64::try_from(page.results.len()).unwrap_or(i64::MAX);
            all.extend(page.results);

            if received < PAGE_LIMIT
                || i64::try_from(all.len()).unwrap_or(i64::MAX) >= page.count
            {
                break;
            }
            offset += received;
        }

        Ok(all)
    }

    /// Every object of `kind`.
    pub async fn all(&self, kind: ResourceKind) -> Result<Vec<Record>, Error> {
        self.filter(kind, &[]).await
    }

    /// First object matching the filter params, or `None`.
    pub async fn get(
        &self,
        kind: ResourceKind,
        params: &[(&str, String)],
    ) -> Result<Option<Record>, Error> {
        Ok(self.filter(kind, params).await?.into_iter().next())
    }

    /// Fetch one object by id; a 404 yields `None`, not an error.
    pub async fn get_by_id(&self, kind: ResourceKind, id: i64) -> Result<Option<Record>, Error> {
        let url = self.object_url(kind, id);
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(resp).await.map(Some)
    }

    // ── Write operations ─────────────────────────────────────────────

    pub async fn create(
        &self,
        kind: ResourceKind,
        payload: &Map<String, Value>,
    ) -> Result<Record, Error> {
        let url = self.kind_url(kind);
        debug!("POST {url}");

        let resp = self.http.post(url).json(payload).send().await?;
        self.handle_response(resp).await
    }

    /// Partial update; only the fields present in `partial` change.
    pub async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        partial: &Map<String, Value>,
    ) -> Result<Record, Error> {
        let url = self.object_url(kind, id);
        debug!("PATCH {url} fields={:?}", partial.keys().collect::<Vec<_>>());

        let resp = self.http.patch(url).json(partial).send().await?;
        self.handle_response(resp).await
    }

    pub async fn delete(&self, kind: ResourceKind, id: i64) -> Result<(), Error> {
        let url = self.object_url(kind, id);
        debug!("DELETE {url}");

        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = &body[..body.len().min(200)];
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Error::InvalidToken;
        }

        let raw = resp.text().await.unwrap_or_default();
        Error::Api {
            status: status.as_u16(),
            message: flatten_error_body(&raw, status),
        }
    }
}

/// Flatten a NetBox error body into a single message.
///
/// Bodies are either `{"detail": "..."}` or a per-field map of message
/// lists; anything unparseable passes through verbatim.
fn flatten_error_body(raw: &str, status: reqwest::StatusCode) -> String {
    if raw.is_empty() {
        return status.to_string();
    }

    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return raw.to_owned();
    };

    if let Some(detail) = value.get("detail").and_then(Value::as_str) {
        return detail.to_owned();
    }

    if let Some(fields) = value.as_object() {
        let mut parts = Vec::new();
        for (field, messages) in fields {
            match messages {
                Value::Array(list) => {
                    let joined = list
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("; ");
                    parts.push(format!("{field}: {joined}"));
                }
                Value::String(s) => parts.push(format!("{field}: {s}")),
                other => parts.push(format!("{field}: {other}")),
            }
        }
        if !parts.is_empty() {
            return parts.join(", ");
        }
    }

    raw.to_owned()
}
