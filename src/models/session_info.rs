//! Introspection snapshot types returned by
//! [`SeriesLinkSession::debug_dump`](crate::SeriesLinkSession::debug_dump).

use serde::Serialize;

/// One registry record: the selector's canonical key and how many callback
/// pairs are attached to it.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntryInfo {
    /// Canonical selector key.
    pub selector: String,
    /// Number of registered (success, error) callback pairs.
    pub callbacks: usize,
    /// Milliseconds since the record was created.
    pub age_ms: u64,
}

/// Point-in-time snapshot of session state. Diagnostic only, not part of
/// the core contract.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDebug {
    /// Connection phase name (`disconnected`, `connecting`, `open`, `closed`).
    pub phase: String,
    /// Pending one-shot get registrations.
    pub pending_gets: Vec<RegistryEntryInfo>,
    /// Live subscription registrations.
    pub subscriptions: Vec<RegistryEntryInfo>,
    /// Deferred actions awaiting the next readiness flush, in send order
    /// (`"subscribe cpu.load|-5m..now|15s"`-style descriptions).
    pub deferred: Vec<String>,
}
