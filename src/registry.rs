//! Selector-keyed callback registries.
//!
//! A session owns two independent instances: a one-shot registry for `get`
//! requests (records are destroyed after their single dispatch) and a
//! persistent registry for subscriptions (records survive until explicitly
//! unregistered). Records map a selector to an ordered list of callback
//! pairs; pairs are opaque and matched on removal by `Arc` identity, never
//! by value.

use crate::models::{ResultKind, Selector};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application callback receiving a result payload.
pub type DataCallback = Arc<dyn Fn(&JsonValue) + Send + Sync>;

/// A (success, error) handler pair supplied by the caller. The library
/// never inspects the handlers beyond invoking the correct one.
#[derive(Clone)]
pub(crate) struct CallbackPair {
    pub on_data: DataCallback,
    pub on_error: DataCallback,
}

impl CallbackPair {
    pub fn new(on_data: DataCallback, on_error: DataCallback) -> Self {
        Self { on_data, on_error }
    }

    /// Identity comparison: true when both handlers are the same
    /// allocations as `other`'s. Two closures with identical behavior are
    /// still distinct pairs.
    fn same_handlers(&self, other: &CallbackPair) -> bool {
        Arc::ptr_eq(&self.on_data, &other.on_data) && Arc::ptr_eq(&self.on_error, &other.on_error)
    }
}

/// One registry record: the ordered callback list for a selector.
struct RegistryRecord {
    pairs: Vec<CallbackPair>,
    created_at: Instant,
}

/// Selector-keyed registry of callback pairs.
///
/// The selector's structural equality is the canonical key: two selectors
/// parsed from field-order-permuted JSON land on the same record.
pub(crate) struct CallbackRegistry {
    /// Registry label used in log lines (`"get"` / `"subscription"`).
    name: &'static str,
    records: HashMap<Selector, RegistryRecord>,
}

impl CallbackRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            records: HashMap::new(),
        }
    }

    /// Append `pair` to the record for `selector`, creating the record if
    /// none exists. Returns `true` when a new record was created, the
    /// signal that the caller should issue (or defer) the record's send
    /// action. Duplicate registration of an identical pair is legal and
    /// creates an independent entry.
    pub fn register(&mut self, selector: &Selector, pair: CallbackPair) -> bool {
        if let Some(record) = self.records.get_mut(selector) {
            record.pairs.push(pair);
            false
        } else {
            self.records.insert(
                selector.clone(),
                RegistryRecord {
                    pairs: vec![pair],
                    created_at: Instant::now(),
                },
            );
            true
        }
    }

    /// Remove the first identity-matching occurrence of `pair` from the
    /// record for `selector`. Returns `true` when this removal emptied the
    /// record and destroyed it, the signal that the caller should submit
    /// an unsubscription. No-op returning `false` when the selector or
    /// pair is not found, or when other pairs remain.
    pub fn unregister(&mut self, selector: &Selector, pair: &CallbackPair) -> bool {
        let Some(record) = self.records.get_mut(selector) else {
            return false;
        };
        let Some(pos) = record.pairs.iter().position(|p| p.same_handlers(pair)) else {
            return false;
        };
        record.pairs.remove(pos);
        if record.pairs.is_empty() {
            self.records.remove(selector);
            true
        } else {
            false
        }
    }

    /// Invoke every matching handler for `selector` in registration order;
    /// the record survives. Returns the number of handlers invoked (zero on
    /// a dispatch miss, which is logged and otherwise dropped).
    pub fn dispatch_persistent(
        &self,
        selector: &Selector,
        kind: ResultKind,
        data: &JsonValue,
    ) -> usize {
        let Some(record) = self.records.get(selector) else {
            self.log_miss(selector);
            return 0;
        };
        for pair in &record.pairs {
            Self::invoke(pair, kind, data);
        }
        record.pairs.len()
    }

    /// As [`dispatch_persistent`](Self::dispatch_persistent), but the
    /// record is destroyed immediately after invocation regardless of
    /// outcome: a later identical inbound result invokes nothing.
    pub fn dispatch_once(&mut self, selector: &Selector, kind: ResultKind, data: &JsonValue) -> usize {
        let Some(record) = self.records.remove(selector) else {
            self.log_miss(selector);
            return 0;
        };
        for pair in &record.pairs {
            Self::invoke(pair, kind, data);
        }
        record.pairs.len()
    }

    fn invoke(pair: &CallbackPair, kind: ResultKind, data: &JsonValue) {
        match kind {
            ResultKind::Success => (pair.on_data)(data),
            ResultKind::Error => (pair.on_error)(data),
        }
    }

    fn log_miss(&self, selector: &Selector) {
        log::debug!(
            "[series-link] no {} callbacks registered for {} - dropping result",
            self.name,
            selector
        );
    }

    /// Destroy records older than `max_age`. Returns how many were purged.
    pub fn purge_older_than(&mut self, max_age: Duration) -> usize {
        let before = self.records.len();
        self.records.retain(|selector, record| {
            let keep = record.created_at.elapsed() <= max_age;
            if !keep {
                log::debug!(
                    "[series-link] expiring pending {} record for {}",
                    self.name,
                    selector
                );
            }
            keep
        });
        before - self.records.len()
    }

    /// Iterate the registered selectors (order unspecified).
    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        self.records.keys()
    }

    /// Snapshot for the debug dump: (canonical key, pair count, age).
    pub fn snapshot(&self) -> Vec<(String, usize, Duration)> {
        self.records
            .iter()
            .map(|(selector, record)| {
                (
                    selector.canonical_key(),
                    record.pairs.len(),
                    record.created_at.elapsed(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelativeBound;
    use serde_json::json;
    use std::sync::Mutex;

    fn selector(name: &str) -> Selector {
        Selector::relative(
            name,
            "-5m".parse().unwrap(),
            RelativeBound::Now,
            "15s".parse().unwrap(),
        )
    }

    /// A pair that records every payload it receives, tagged by handler.
    fn recording_pair(seen: &Arc<Mutex<Vec<String>>>, tag: &str) -> CallbackPair {
        let data_seen = seen.clone();
        let data_tag = format!("{}-data", tag);
        let err_seen = seen.clone();
        let err_tag = format!("{}-err", tag);
        CallbackPair::new(
            Arc::new(move |v: &JsonValue| data_seen.lock().unwrap().push(format!("{}:{}", data_tag, v))),
            Arc::new(move |v: &JsonValue| err_seen.lock().unwrap().push(format!("{}:{}", err_tag, v))),
        )
    }

    #[test]
    fn test_register_returns_true_only_for_new_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("get");
        assert!(reg.register(&selector("a"), recording_pair(&seen, "p1")));
        assert!(!reg.register(&selector("a"), recording_pair(&seen, "p2")));
        assert!(reg.register(&selector("b"), recording_pair(&seen, "p3")));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_dispatch_persistent_fires_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("subscription");
        reg.register(&selector("a"), recording_pair(&seen, "first"));
        reg.register(&selector("a"), recording_pair(&seen, "second"));

        let fired = reg.dispatch_persistent(&selector("a"), ResultKind::Success, &json!(1));
        assert_eq!(fired, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first-data:1", "second-data:1"]
        );

        // Record survives: a second dispatch fires again.
        reg.dispatch_persistent(&selector("a"), ResultKind::Success, &json!(2));
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_dispatch_once_destroys_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("get");
        reg.register(&selector("a"), recording_pair(&seen, "p"));

        assert_eq!(reg.dispatch_once(&selector("a"), ResultKind::Success, &json!([1])), 1);
        // Identical second result: record is gone, nothing fires.
        assert_eq!(reg.dispatch_once(&selector("a"), ResultKind::Success, &json!([1])), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_error_kind_routes_to_error_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("get");
        reg.register(&selector("a"), recording_pair(&seen, "p"));
        reg.dispatch_once(&selector("a"), ResultKind::Error, &json!("boom"));
        assert_eq!(*seen.lock().unwrap(), vec!["p-err:\"boom\""]);
    }

    #[test]
    fn test_dispatch_miss_is_silent() {
        let reg = CallbackRegistry::new("subscription");
        assert_eq!(
            reg.dispatch_persistent(&selector("missing"), ResultKind::Success, &json!(1)),
            0
        );
    }

    #[test]
    fn test_unregister_matches_by_identity() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("subscription");
        let p1 = recording_pair(&seen, "p1");
        let p2 = recording_pair(&seen, "p2");
        reg.register(&selector("a"), p1.clone());
        reg.register(&selector("a"), p2.clone());

        // Removing p1 leaves p2's record alive.
        assert!(!reg.unregister(&selector("a"), &p1));
        // p1 again: not found, no-op.
        assert!(!reg.unregister(&selector("a"), &p1));
        // Last pair removed: record destroyed.
        assert!(reg.unregister(&selector("a"), &p2));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_duplicate_pair_registrations_are_independent() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("subscription");
        let pair = recording_pair(&seen, "dup");
        reg.register(&selector("a"), pair.clone());
        reg.register(&selector("a"), pair.clone());

        // Each dispatch fires both entries.
        assert_eq!(reg.dispatch_persistent(&selector("a"), ResultKind::Success, &json!(1)), 2);
        // One unregister removes exactly one of the two.
        assert!(!reg.unregister(&selector("a"), &pair));
        assert_eq!(reg.dispatch_persistent(&selector("a"), ResultKind::Success, &json!(2)), 1);
        assert!(reg.unregister(&selector("a"), &pair));
    }

    #[test]
    fn test_unregister_unknown_selector_is_noop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("subscription");
        assert!(!reg.unregister(&selector("nope"), &recording_pair(&seen, "p")));
    }

    #[test]
    fn test_purge_older_than() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("get");
        reg.register(&selector("a"), recording_pair(&seen, "p"));
        // Nothing is older than an hour.
        assert_eq!(reg.purge_older_than(Duration::from_secs(3600)), 0);
        // Everything is older than zero after a measurable pause.
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(reg.purge_older_than(Duration::ZERO), 1);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_field_order_permuted_selectors_share_a_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = CallbackRegistry::new("get");
        let a: Selector = serde_json::from_value(json!({
            "identifier": "cpu.load", "from": "-5m", "until": "now", "granularity": "15s"
        }))
        .unwrap();
        let b: Selector = serde_json::from_value(json!({
            "granularity": "15s", "until": "now", "identifier": "cpu.load", "from": "-5m"
        }))
        .unwrap();
        assert!(reg.register(&a, recording_pair(&seen, "p1")));
        assert!(!reg.register(&b, recording_pair(&seen, "p2")), "same canonical key");
    }
}
