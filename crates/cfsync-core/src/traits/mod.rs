//! Core traits for cfsync
//!
//! - [`IpSource`]: Discover the external address
//! - [`DnsProvider`]: Read zones/records and update record content

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::IpSource;
pub use dns_provider::{
    DnsProvider, DnsRecord, ProviderMessage, RecordType, RecordUpdate, UpdateOutcome, Zone,
};
