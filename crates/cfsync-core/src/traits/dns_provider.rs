// # DNS Provider Trait
//
// Defines the interface for reading zones and records from a DNS provider
// API and overwriting record content.
//
// ## Implementations
//
// - Cloudflare: `cfsync-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfsync_core::{DnsProvider, RecordType, RecordUpdate};
//
// let zones = provider.list_zones().await?;
// for zone in &zones {
//     for record in provider.list_records(&zone.id, RecordType::A).await? {
//         let update = RecordUpdate::with_content(&record, "203.0.113.7");
//         provider.update_record(&zone.id, &record.id, &update).await?;
//     }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Canonical name
    Cname,
    /// Text record
    Txt,
    /// Mail exchanger
    Mx,
    /// Anything this crate does not manage
    #[serde(other)]
    Other,
}

impl RecordType {
    /// Record type that holds an address of this family
    pub fn for_address(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Wire name (`"A"`, `"AAAA"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS zone as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider-assigned identifier
    pub id: String,
    /// Zone name (e.g. "example.com")
    pub name: String,
}

/// A DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-assigned identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record content; an address string for A/AAAA records
    pub content: String,
    /// Time-to-live (1 means "automatic" on Cloudflare)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Whether the record is proxied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

/// Replacement values for a record
///
/// Only `content` is ever changed by the engine; everything else is copied
/// from the existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordUpdate {
    /// Record type (unchanged)
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record name (unchanged)
    pub name: String,
    /// New content
    pub content: String,
    /// TTL (unchanged)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Proxy flag (unchanged)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

impl RecordUpdate {
    /// Copy `record`, replacing only its content
    pub fn with_content(record: &DnsRecord, content: impl Into<String>) -> Self {
        Self {
            record_type: record.record_type,
            name: record.name.clone(),
            content: content.into(),
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

/// A structured error or message reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Provider error code
    #[serde(default)]
    pub code: i64,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ProviderMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Result of a single update call that reached the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The provider accepted the update
    Updated {
        /// The record as stored after the update
        record: DnsRecord,
    },
    /// The provider refused the update and said why
    Rejected {
        /// Provider-reported errors, passed through uninterpreted
        errors: Vec<ProviderMessage>,
    },
}

/// Trait for DNS provider implementations
///
/// Providers are thin API clients. They do not decide whether an update is
/// needed, do not retry, do not cache between calls and do not spawn tasks;
/// all of that is owned by [`crate::SyncEngine`].
///
/// # Errors vs. Rejections
///
/// `Err(_)` means the call could not be completed (transport failure,
/// authentication failure, malformed response). A well-formed refusal of an
/// update is `Ok(UpdateOutcome::Rejected { .. })` so the engine can log the
/// provider's own messages and carry on with the next record.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone visible to the configured credential
    async fn list_zones(&self) -> Result<Vec<Zone>, crate::Error>;

    /// List the records of one zone, filtered by type
    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Overwrite a record
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> Result<UpdateOutcome, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
