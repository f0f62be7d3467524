// # IP Source Trait
//
// Defines the interface for discovering the caller's external address.
//
// ## Implementations
//
// - HTTP echo services: `cfsync-ip-echo` crate
//
// ## Usage
//
// ```rust,ignore
// use cfsync_core::IpSource;
//
// #[tokio::main]
// async fn main() {
//     let source = /* IpSource implementation */;
//
//     match source.resolve().await {
//         Some(ip) => println!("external address: {}", ip),
//         None => println!("no endpoint answered, try again later"),
//     }
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for external address resolvers
///
/// A resolver is consulted once per pass. It owns no state between calls:
/// every call performs fresh lookups.
///
/// # Not Found Is Not An Error
///
/// `resolve()` returns `None` when no lookup produced a usable address.
/// Callers treat that as "skip this pass", never as a failure, so that a
/// temporary outage can never cause records to be written with an empty or
/// bogus value.
///
/// # Cancellation
///
/// Implementations must be cancellation-safe: the engine drops the future
/// when a shutdown signal arrives mid-lookup.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Resolve the current external address
    ///
    /// # Returns
    ///
    /// - `Some(IpAddr)`: the first address obtained
    /// - `None`: nothing usable was obtained
    async fn resolve(&self) -> Option<IpAddr>;

    /// Name of the source (for logging)
    fn source_name(&self) -> &'static str {
        "unknown"
    }
}
