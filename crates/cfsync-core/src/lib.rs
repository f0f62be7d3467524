// # cfsync-core
//
// Core library for keeping DNS address records in sync with the caller's
// public IP.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for discovering the current external address
// - **DnsProvider**: Trait for listing zones/records and updating record content
// - **SyncEngine**: Timed loop that reconciles records against the address
// - **UpdaterConfig**: Startup configuration (credential, interval, endpoints)
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Reconciliation logic is separate from the HTTP integrations
// 2. **Stateless Passes**: Every pass re-fetches everything; the provider is the source of truth
// 3. **Never Fatal**: Failures inside a pass are logged and the schedule continues
// 4. **Library-First**: The daemon is a thin wrapper; everything can be embedded

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{
    DnsProvider, DnsRecord, IpSource, ProviderMessage, RecordType, RecordUpdate, UpdateOutcome,
    Zone,
};
pub use engine::{EngineEvent, EngineState, PassSummary, SyncEngine};
pub use config::{ConfigOverrides, Credential, IpVersion, SettingsFile, UpdaterConfig};
pub use error::{Error, Result};
