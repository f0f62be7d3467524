// # Cloudflare DNS Provider
//
// Thin client for the Cloudflare v4 API implementing `DnsProvider`.
//
// ## Behavior
//
// - Zones and records are listed page by page until `result_info.total_pages`
//   is reached
// - Updates are a single PUT that carries the full record (type, name,
//   content, ttl, proxied), so only the content actually changes
// - An update the API answers with `success: false` is reported as
//   `UpdateOutcome::Rejected` with the API's own error list
// - No retries, no caching, no background tasks: the engine owns scheduling
//
// ## Security
//
// Credentials never appear in logs or in `Debug` output.
//
// ## API Reference
//
// - List Zones: GET `/zones?page=..&per_page=..`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=..&page=..&per_page=..`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfsync_core::traits::{
    DnsProvider, DnsRecord, ProviderMessage, RecordType, RecordUpdate, UpdateOutcome, Zone,
};
use cfsync_core::{Credential, Error, Result, UpdaterConfig};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size requested from list endpoints
const PAGE_SIZE: u32 = 50;

/// Name used in errors and logs
const PROVIDER: &str = "cloudflare";

/// Standard v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ProviderMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone and record listing)
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// API credential
    /// ⚠️ NEVER log this value
    credential: Credential,

    /// API root, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

// Custom Debug implementation that hides the credential
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credential", &self.credential.kind())
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `credential`: API token, or account email + global API key
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    pub fn new(credential: Credential, dry_run: bool) -> Result<Self> {
        match &credential {
            Credential::ApiToken { token } if token.trim().is_empty() => {
                return Err(Error::config("Cloudflare API token cannot be empty"));
            }
            Credential::EmailKey { email, api_key }
                if email.trim().is_empty() || api_key.trim().is_empty() =>
            {
                return Err(Error::config(
                    "Cloudflare email and API key must both be non-empty",
                ));
            }
            _ => {}
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credential,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a provider from the updater configuration
    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        if config.dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }
        Self::new(config.credential.clone(), config.dry_run)
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether updates are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Credential::ApiToken { token } => request.bearer_auth(token),
            Credential::EmailKey { email, api_key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", api_key),
        }
    }

    /// GET every page of a list endpoint
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, &str)],
        what: &str,
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_str = page.to_string();
            let per_page = PAGE_SIZE.to_string();
            let mut query: Vec<(&str, &str)> = filters.to_vec();
            query.push(("page", &page_str));
            query.push(("per_page", &per_page));

            tracing::debug!(%url, page, "Listing {}", what);

            let response = self
                .authorize(self.client.get(&url))
                .query(&query)
                .send()
                .await
                .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

            if !status.is_success() {
                return Err(status_error(status, &body, what));
            }

            let envelope: Envelope<Vec<T>> = serde_json::from_str(&body).map_err(|e| {
                Error::provider(PROVIDER, format!("Failed to parse {} response: {}", what, e))
            })?;

            if !envelope.success {
                return Err(Error::provider(
                    PROVIDER,
                    format!("Listing {} failed: {}", what, join_messages(&envelope.errors)),
                ));
            }

            let batch = envelope.result.ok_or_else(|| {
                Error::provider(PROVIDER, format!("Invalid {} response: result is missing", what))
            })?;
            let empty = batch.is_empty();
            items.extend(batch);

            let total_pages = envelope.result_info.map(|info| info.total_pages).unwrap_or(1);
            if empty || page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let zones: Vec<Zone> = self.get_all("/zones", &[], "zones").await?;
        tracing::debug!(count = zones.len(), "Listed zones");
        Ok(zones)
    }

    async fn list_records(&self, zone_id: &str, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        let path = format!("/zones/{}/dns_records", zone_id);
        let records: Vec<DnsRecord> = self
            .get_all(&path, &[("type", record_type.as_str())], "DNS records")
            .await?;
        tracing::debug!(zone_id, count = records.len(), "Listed DNS records");
        Ok(records)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> Result<UpdateOutcome> {
        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(update)?
            );
            return Ok(UpdateOutcome::Updated {
                record: DnsRecord {
                    id: record_id.to_string(),
                    name: update.name.clone(),
                    record_type: update.record_type,
                    content: update.content.clone(),
                    ttl: update.ttl,
                    proxied: update.proxied,
                },
            });
        }

        let response = self
            .authorize(self.client.put(&url))
            .json(update)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        // Throttling, auth and server failures say nothing about this record
        if matches!(status.as_u16(), 401 | 403 | 429 | 500..=599) {
            return Err(status_error(status, &body, "DNS record update"));
        }

        let envelope: Envelope<DnsRecord> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(status_error(status, &body, "DNS record update"));
            }
            Err(e) => {
                return Err(Error::provider(
                    PROVIDER,
                    format!("Failed to parse update response: {}", e),
                ));
            }
        };

        if !envelope.success {
            return Ok(UpdateOutcome::Rejected {
                errors: envelope.errors,
            });
        }

        let record = envelope.result.ok_or_else(|| {
            Error::provider(PROVIDER, "Invalid update response: result is missing")
        })?;

        Ok(UpdateOutcome::Updated { record })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Map a non-success status to an error
fn status_error(status: StatusCode, body: &str, what: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid credential or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{} not found. Status: {}", what, status)),
        429 => Error::rate_limited(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::http(format!(
            "Cloudflare server error (transient): {} - {}",
            status,
            body.trim()
        )),
        _ => Error::provider(
            PROVIDER,
            format!("Request for {} failed: {} - {}", what, status, body.trim()),
        ),
    }
}

fn join_messages(errors: &[ProviderMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
