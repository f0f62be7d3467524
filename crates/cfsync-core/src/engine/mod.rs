//! Reconciliation engine
//!
//! The SyncEngine is responsible for:
//! - Resolving the external address via IpSource once per pass
//! - Listing zones and address records via DnsProvider
//! - Updating every record whose content differs from the address
//! - Sleeping for the configured interval between passes
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐
//!   timer ──▶│  SyncEngine  │──── EngineEvent ───▶ (monitoring)
//!            └──────────────┘
//!               │        │
//!       resolve │        │ list zones / list records / update
//!               ▼        ▼
//!      ┌──────────┐  ┌─────────────┐
//!      │ IpSource │  │ DnsProvider │
//!      └──────────┘  └─────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Resolve the external address; if none, end the pass with no API calls
//! 2. List zones
//! 3. For each zone, list records of the address's type
//! 4. For each record whose content differs, send one update
//! 5. Log each outcome individually; one failed record never stops the rest
//!
//! ## States
//!
//! `Waiting` ⇄ `Reconciling`, and `Stopped` once the shutdown future
//! resolves. Shutdown is raced against every pass and every sleep, so an
//! in-flight HTTP call is dropped rather than awaited.

use crate::config::UpdaterConfig;
use crate::error::Result;
use crate::traits::{DnsProvider, IpSource, ProviderMessage, RecordType, RecordUpdate, UpdateOutcome};
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        interval: Duration,
    },

    /// A pass resolved the external address
    AddressResolved {
        address: IpAddr,
    },

    /// No endpoint produced an address; the pass was skipped
    ResolutionFailed,

    /// Record already pointed at the address
    RecordUnchanged {
        zone: String,
        record: String,
    },

    /// Record was updated
    RecordUpdated {
        zone: String,
        record: String,
        previous: String,
        address: IpAddr,
    },

    /// Provider refused an update
    UpdateRejected {
        zone: String,
        record: String,
        errors: Vec<ProviderMessage>,
    },

    /// Update call could not be completed
    UpdateFailed {
        zone: String,
        record: String,
        error: String,
    },

    /// Pass aborted by a zone or record listing failure
    PassFailed {
        error: String,
    },

    /// Pass finished (possibly early because no address was resolved)
    PassCompleted {
        summary: PassSummary,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Counts for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Address the pass reconciled against, if one was resolved
    pub address: Option<IpAddr>,
    /// Zones listed
    pub zones: usize,
    /// Address records compared
    pub records_checked: usize,
    /// Records left alone because they already matched
    pub unchanged: usize,
    /// Records updated successfully
    pub updated: usize,
    /// Updates refused by the provider
    pub rejected: usize,
    /// Updates that could not be completed
    pub failed: usize,
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Idle, timer armed
    Waiting,
    /// Pass in progress
    Reconciling,
    /// Shut down
    Stopped,
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run_until()`] (or [`SyncEngine::run_with_shutdown()`])
/// 3. Engine runs passes back to back, separated by the update interval
/// 4. Returns once the shutdown future resolves
///
/// ## Threading
///
/// Everything runs on the caller's task. There is no background work and
/// nothing is shared between passes except the source and provider.
pub struct SyncEngine {
    /// External address resolver
    ip_source: Box<dyn IpSource>,

    /// DNS provider API client
    provider: Box<dyn DnsProvider>,

    /// Delay between passes
    interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,

    /// Current lifecycle state
    state: watch::Sender<EngineState>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events.
    /// Dropping the receiver is fine; events are then discarded.
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: &UpdaterConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let (state, _) = watch::channel(EngineState::Waiting);

        let engine = Self {
            ip_source,
            provider,
            interval: config.update_interval(),
            event_tx: tx,
            state,
        };

        Ok((engine, rx))
    }

    /// Subscribe to lifecycle state changes
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Run passes until `shutdown` resolves
    ///
    /// The first pass starts immediately. Failures inside a pass are logged
    /// and never end the loop.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(interval = ?self.interval, provider = self.provider.provider_name(),
              source = self.ip_source.source_name(), "DNS updater started");
        self.emit_event(EngineEvent::Started {
            interval: self.interval,
        });

        loop {
            self.state.send_replace(EngineState::Reconciling);

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                outcome = self.reconcile_once() => outcome,
            };

            match outcome {
                Ok(summary) => {
                    debug!(?summary, "Pass completed");
                    self.emit_event(EngineEvent::PassCompleted { summary });
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(error = %e, "Pass failed, will retry next tick");
                    } else {
                        error!(error = %e, "Pass failed, will retry next tick");
                    }
                    self.emit_event(EngineEvent::PassFailed {
                        error: e.to_string(),
                    });
                }
            }

            self.state.send_replace(EngineState::Waiting);

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Shutdown signal received, DNS updater stopped");
        self.state.send_replace(EngineState::Stopped);
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
    }

    /// Perform one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(PassSummary)`: the pass ran to completion (or was skipped because
    ///   no address was resolved); individual update failures are counted, not returned
    /// - `Err(Error)`: listing zones or records failed; the rest of the pass was abandoned
    pub async fn reconcile_once(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        let Some(address) = self.ip_source.resolve().await else {
            warn!("Could not resolve external IP address, skipping pass");
            self.emit_event(EngineEvent::ResolutionFailed);
            return Ok(summary);
        };

        debug!(%address, "Resolved external address");
        summary.address = Some(address);
        self.emit_event(EngineEvent::AddressResolved { address });

        let record_type = RecordType::for_address(&address);
        let content = address.to_string();

        let zones = self.provider.list_zones().await?;
        summary.zones = zones.len();

        for zone in &zones {
            debug!(zone = %zone.name, "Checking zone");

            let records = self.provider.list_records(&zone.id, record_type).await?;

            for record in records {
                // Providers are asked to filter, but only ever touch the managed type
                if record.record_type != record_type {
                    continue;
                }

                summary.records_checked += 1;

                if record.content == content {
                    debug!(zone = %zone.name, record = %record.name, %address, "Record up to date");
                    summary.unchanged += 1;
                    self.emit_event(EngineEvent::RecordUnchanged {
                        zone: zone.name.clone(),
                        record: record.name.clone(),
                    });
                    continue;
                }

                let update = RecordUpdate::with_content(&record, content.clone());

                match self.provider.update_record(&zone.id, &record.id, &update).await {
                    Ok(UpdateOutcome::Updated { .. }) => {
                        info!(zone = %zone.name, record = %record.name,
                              old = %record.content, new = %address, "Updated record");
                        summary.updated += 1;
                        self.emit_event(EngineEvent::RecordUpdated {
                            zone: zone.name.clone(),
                            record: record.name.clone(),
                            previous: record.content.clone(),
                            address,
                        });
                    }
                    Ok(UpdateOutcome::Rejected { errors }) => {
                        if errors.is_empty() {
                            error!(zone = %zone.name, record = %record.name,
                                   "Update rejected without an error message");
                        }
                        for e in &errors {
                            error!(zone = %zone.name, record = %record.name,
                                   code = e.code, "Update rejected: {}", e.message);
                        }
                        summary.rejected += 1;
                        self.emit_event(EngineEvent::UpdateRejected {
                            zone: zone.name.clone(),
                            record: record.name.clone(),
                            errors,
                        });
                    }
                    Err(e) => {
                        error!(zone = %zone.name, record = %record.name,
                               error = %e, "Update failed");
                        summary.failed += 1;
                        self.emit_event(EngineEvent::UpdateFailed {
                            zone: zone.name.clone(),
                            record: record.name.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Emit an engine event
    ///
    /// Never blocks: a full channel drops the event with a warning, a closed
    /// one drops it silently.
    fn emit_event(&self, event: EngineEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
