//! Test doubles and common utilities for engine contract tests
//!
//! The doubles record every call so tests can assert on what the engine
//! asked of its collaborators, not just on what it logged.

#![allow(dead_code)]

use cfsync_core::error::{Error, Result};
use cfsync_core::traits::{
    DnsProvider, DnsRecord, IpSource, ProviderMessage, RecordType, RecordUpdate, UpdateOutcome,
    Zone,
};
use cfsync_core::{Credential, UpdaterConfig};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An IpSource that replays scripted answers, then repeats a fallback
pub struct ScriptedIpSource {
    script: Mutex<VecDeque<Option<IpAddr>>>,
    fallback: Option<IpAddr>,
    resolve_call_count: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    /// Always resolve to `ip`
    pub fn fixed(ip: IpAddr) -> Self {
        Self::scripted(Vec::new(), Some(ip))
    }

    /// Never resolve
    pub fn unreachable() -> Self {
        Self::scripted(Vec::new(), None)
    }

    /// Answer from `script` first, then `fallback` forever
    pub fn scripted(script: Vec<Option<IpAddr>>, fallback: Option<IpAddr>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle on the resolve() call counter that survives moving the source
    pub fn resolve_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.resolve_call_count)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn resolve(&self) -> Option<IpAddr> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Everything a MockDnsProvider was asked to do
#[derive(Debug, Default)]
pub struct ProviderCalls {
    pub list_zones: usize,
    pub list_records: Vec<(String, RecordType)>,
    pub updates: Vec<(String, String, RecordUpdate)>,
    pub completed_updates: usize,
}

impl ProviderCalls {
    pub fn total(&self) -> usize {
        self.list_zones + self.list_records.len() + self.updates.len()
    }

    /// Names of updated records, in call order
    pub fn updated_names(&self) -> Vec<String> {
        self.updates.iter().map(|(_, _, u)| u.name.clone()).collect()
    }
}

/// A scripted DnsProvider that records calls
pub struct MockDnsProvider {
    zones: Vec<(Zone, Vec<DnsRecord>)>,
    rejections: HashMap<String, Vec<ProviderMessage>>,
    failing_updates: HashSet<String>,
    fail_zone_listing: bool,
    update_delay: Option<Duration>,
    calls: Arc<Mutex<ProviderCalls>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            zones: Vec::new(),
            rejections: HashMap::new(),
            failing_updates: HashSet::new(),
            fail_zone_listing: false,
            update_delay: None,
            calls: Arc::new(Mutex::new(ProviderCalls::default())),
        }
    }

    /// Add a zone and the records it holds
    pub fn with_zone(mut self, zone: Zone, records: Vec<DnsRecord>) -> Self {
        self.zones.push((zone, records));
        self
    }

    /// Reject updates of the named record with the given message
    pub fn rejecting(mut self, record_name: &str, code: i64, message: &str) -> Self {
        self.rejections.insert(
            record_name.to_string(),
            vec![ProviderMessage {
                code,
                message: message.to_string(),
            }],
        );
        self
    }

    /// Fail updates of the named record with a transport error
    pub fn failing(mut self, record_name: &str) -> Self {
        self.failing_updates.insert(record_name.to_string());
        self
    }

    /// Fail every zone listing
    pub fn failing_zone_listing(mut self) -> Self {
        self.fail_zone_listing = true;
        self
    }

    /// Sleep before answering each update
    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    /// Shared handle on the call log
    pub fn calls(&self) -> Arc<Mutex<ProviderCalls>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.calls.lock().unwrap().list_zones += 1;

        if self.fail_zone_listing {
            return Err(Error::http("connection refused"));
        }

        Ok(self.zones.iter().map(|(z, _)| z.clone()).collect())
    }

    async fn list_records(&self, zone_id: &str, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        self.calls
            .lock()
            .unwrap()
            .list_records
            .push((zone_id.to_string(), record_type));

        self.zones
            .iter()
            .find(|(z, _)| z.id == zone_id)
            .map(|(_, records)| records.clone())
            .ok_or_else(|| Error::not_found(format!("zone {}", zone_id)))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> Result<UpdateOutcome> {
        self.calls.lock().unwrap().updates.push((
            zone_id.to_string(),
            record_id.to_string(),
            update.clone(),
        ));

        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().completed_updates += 1;

        if self.failing_updates.contains(&update.name) {
            return Err(Error::http("operation timed out"));
        }

        if let Some(errors) = self.rejections.get(&update.name) {
            return Ok(UpdateOutcome::Rejected {
                errors: errors.clone(),
            });
        }

        Ok(UpdateOutcome::Updated {
            record: DnsRecord {
                id: record_id.to_string(),
                name: update.name.clone(),
                record_type: update.record_type,
                content: update.content.clone(),
                ttl: update.ttl,
                proxied: update.proxied,
            },
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

pub fn zone(id: &str, name: &str) -> Zone {
    Zone {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn a_record(id: &str, name: &str, content: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type: RecordType::A,
        content: content.to_string(),
        ttl: Some(1),
        proxied: Some(false),
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid test address")
}

/// Helper to create a minimal UpdaterConfig for testing
pub fn test_config(update_interval_secs: u64) -> UpdaterConfig {
    let mut config = UpdaterConfig::new(Credential::ApiToken {
        token: "test-token".to_string(),
    });
    config.update_interval_secs = update_interval_secs;
    config
}
