use crate::classify::EmailType;
use crate::headline::MuteList;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const SIGNALS_KEY: &str = "triage.signals";
const MUTES_KEY: &str = "triage.mutes";
const DISMISSED_KEY: &str = "triage.dismissed";

/// A surfaced, classified email. Carries headline and subject-derived text
/// only; body content and auto-generated replies or tasks are never derived
/// from a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSignal {
    pub id: String,
    pub thread_id: String,
    pub email_type: EmailType,
    pub headline: String,
    pub work_life_score: f32,
    pub received_at: DateTime<Utc>,
    /// When the store accepted the signal; drives day rollover.
    pub surfaced_at: DateTime<Utc>,
    /// Set when the signal's thread was muted at insertion time. Suppressed
    /// signals are retained but never listed.
    #[serde(default)]
    pub suppressed: bool,
}

/// String-keyed persistence collaborator. Implementations only need get and
/// set; the store does shape-tolerant decoding on top.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// In-memory key-value store. Clones share the same underlying map, which
/// lets tests rebuild a store against "persisted" state.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("kv mutex poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("kv mutex poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Single-file JSON key-value store used by the CLI.
pub struct FileKv {
    path: PathBuf,
}

impl FileKv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileKv { path: path.into() }
    }

    fn read_map(&self) -> anyhow::Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading state file {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("state file {} is not a JSON object", self.path.display()))
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut map = self.read_map()?;
        Ok(map.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&map)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing state file {}", self.path.display()))?;
        Ok(())
    }
}

/// Holds today's surfaced signals plus the mute and dismissed sets.
/// Constructed once at startup and injected into the pipeline; the
/// in-memory state is authoritative and persistence writes are
/// fire-and-forget.
pub struct SignalStore<K: KeyValueStore> {
    kv: K,
    signals: Vec<EmailSignal>,
    dismissed: HashSet<String>,
    mutes: MuteList,
    mute_expiry_days: Option<u32>,
}

impl<K: KeyValueStore> SignalStore<K> {
    /// Load persisted state. A missing, corrupt, or alien snapshot degrades
    /// to an empty store with a warning; it never fails construction.
    pub fn new(kv: K, mute_expiry_days: Option<u32>) -> Self {
        let signals = load_json::<Vec<EmailSignal>, K>(&kv, SIGNALS_KEY);
        let mutes = load_json::<MuteList, K>(&kv, MUTES_KEY);
        let dismissed = load_json::<HashSet<String>, K>(&kv, DISMISSED_KEY);
        SignalStore {
            kv,
            signals,
            dismissed,
            mutes,
            mute_expiry_days,
        }
    }

    /// Insert a freshly classified signal. Dismissed ids are refused
    /// outright (dismissal is terminal), already-present ids are left alone
    /// (re-derivation is idempotent), and signals from muted threads are
    /// kept as suppressed so they never surface. Returns whether the signal
    /// will be visible.
    pub fn insert(&mut self, mut signal: EmailSignal, now: DateTime<Utc>) -> bool {
        if self.dismissed.contains(&signal.id) {
            log::debug!("{}: previously dismissed, dropped", signal.id);
            return false;
        }
        if self.signals.iter().any(|s| s.id == signal.id) {
            log::debug!("{}: already surfaced", signal.id);
            return false;
        }

        signal.surfaced_at = now;
        if self
            .mutes
            .is_muted(&signal.thread_id, now, self.mute_expiry_days)
        {
            log::debug!(
                "{}: thread {} is muted, suppressing",
                signal.id,
                signal.thread_id
            );
            signal.suppressed = true;
            self.signals.push(signal);
            self.persist();
            return false;
        }

        log::info!("{}: surfaced as {}", signal.id, signal.email_type.as_str());
        self.signals.push(signal);
        self.persist();
        true
    }

    /// Dismiss a surfaced signal: terminal for the id, and the thread goes
    /// on the mute list. Idempotent; a second call changes nothing.
    pub fn dismiss(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        if self.dismissed.contains(id) {
            return false;
        }
        let Some(pos) = self.signals.iter().position(|s| s.id == id) else {
            return false;
        };
        let signal = self.signals.remove(pos);
        self.dismissed.insert(signal.id.clone());
        self.mutes.mute(&signal.thread_id, now);
        log::info!("{id}: dismissed, thread {} muted", signal.thread_id);
        self.persist();
        true
    }

    /// Today's visible signals, newest first. Signals surfaced on a prior
    /// day are evicted on the way.
    pub fn signals_for_today(&mut self, now: DateTime<Utc>) -> Vec<EmailSignal> {
        let today = now.date_naive();
        let before = self.signals.len();
        self.signals.retain(|s| s.surfaced_at.date_naive() == today);
        if self.signals.len() != before {
            log::debug!("{} signal(s) expired at day rollover", before - self.signals.len());
            self.persist();
        }

        let mut visible: Vec<EmailSignal> = self
            .signals
            .iter()
            .filter(|s| !s.suppressed)
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        visible
    }

    /// Manual unmute, the only way a mute ends when no expiry is configured.
    pub fn unmute(&mut self, thread_id: &str) -> bool {
        let removed = self.mutes.unmute(thread_id);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn is_dismissed(&self, id: &str) -> bool {
        self.dismissed.contains(id)
    }

    pub fn mute_list(&self) -> &MuteList {
        &self.mutes
    }

    /// Clear all state, in memory and persisted.
    pub fn reset(&mut self) {
        self.signals.clear();
        self.dismissed.clear();
        self.mutes = MuteList::default();
        self.persist();
    }

    fn persist(&mut self) {
        store_json(&mut self.kv, SIGNALS_KEY, &self.signals);
        store_json(&mut self.kv, MUTES_KEY, &self.mutes);
        store_json(&mut self.kv, DISMISSED_KEY, &self.dismissed);
    }
}

fn load_json<T: DeserializeOwned + Default, K: KeyValueStore>(kv: &K, key: &str) -> T {
    match kv.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("discarding unreadable snapshot for {key}: {e}");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("failed to read {key}, starting empty: {e}");
            T::default()
        }
    }
}

fn store_json<T: Serialize, K: KeyValueStore>(kv: &mut K, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("failed to encode {key}: {e}");
            return;
        }
    };
    if let Err(e) = kv.set(key, &raw) {
        // In-memory state stays authoritative for the session.
        log::warn!("failed to persist {key}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signal(id: &str, thread_id: &str, received_at: DateTime<Utc>) -> EmailSignal {
        EmailSignal {
            id: id.to_string(),
            thread_id: thread_id.to_string(),
            email_type: EmailType::WorkStandalone,
            headline: format!("someone needs a look at {id}"),
            work_life_score: 0.5,
            received_at,
            surfaced_at: received_at,
            suppressed: false,
        }
    }

    #[test]
    fn insert_then_list() {
        let now = Utc::now();
        let mut store = SignalStore::new(MemoryKv::default(), None);
        assert!(store.insert(signal("m1", "t1", now - Duration::hours(2)), now));
        assert!(store.insert(signal("m2", "t2", now - Duration::hours(1)), now));

        let visible = store.signals_for_today(now);
        assert_eq!(visible.len(), 2);
        // Newest first.
        assert_eq!(visible[0].id, "m2");
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let now = Utc::now();
        let mut store = SignalStore::new(MemoryKv::default(), None);
        assert!(store.insert(signal("m1", "t1", now), now));
        assert!(!store.insert(signal("m1", "t1", now), now));
        assert_eq!(store.signals_for_today(now).len(), 1);
    }

    #[test]
    fn dismissal_is_terminal_and_idempotent() {
        let now = Utc::now();
        let mut store = SignalStore::new(MemoryKv::default(), None);
        store.insert(signal("m1", "t1", now), now);

        assert!(store.dismiss("m1", now));
        let muted_at = store.mute_list().muted_at("t1");
        assert!(muted_at.is_some());

        // Second dismissal leaves the mute list unchanged.
        assert!(!store.dismiss("m1", now + Duration::hours(1)));
        assert_eq!(store.mute_list().len(), 1);
        assert_eq!(store.mute_list().muted_at("t1"), muted_at);

        // Re-fetch cannot resurface the id.
        assert!(!store.insert(signal("m1", "t1", now), now));
        assert!(store.signals_for_today(now).is_empty());
    }

    #[test]
    fn muted_thread_suppresses_new_signals() {
        let now = Utc::now();
        let mut store = SignalStore::new(MemoryKv::default(), None);
        store.insert(signal("m1", "t1", now), now);
        store.dismiss("m1", now);

        // A different message in the same thread stays invisible.
        assert!(!store.insert(signal("m2", "t1", now), now));
        assert!(store.signals_for_today(now).is_empty());

        // Manual unmute lets later messages through again.
        assert!(store.unmute("t1"));
        assert!(store.insert(signal("m3", "t1", now), now));
        assert_eq!(store.signals_for_today(now).len(), 1);
    }

    #[test]
    fn day_rollover_expires_signals() {
        let now = Utc::now();
        let mut store = SignalStore::new(MemoryKv::default(), None);
        store.insert(signal("m1", "t1", now), now);
        assert_eq!(store.signals_for_today(now).len(), 1);

        let tomorrow = now + Duration::days(1);
        assert!(store.signals_for_today(tomorrow).is_empty());
    }

    #[test]
    fn state_survives_store_rebuild() {
        let now = Utc::now();
        let kv = MemoryKv::default();
        {
            let mut store = SignalStore::new(kv.clone(), None);
            store.insert(signal("m1", "t1", now), now);
            store.dismiss("m1", now);
        }

        let mut reloaded = SignalStore::new(kv, None);
        assert!(reloaded.is_dismissed("m1"));
        assert!(!reloaded.insert(signal("m1", "t1", now), now));
        assert!(reloaded.mute_list().is_muted("t1", now, None));
    }

    #[test]
    fn corrupt_snapshot_degrades_to_empty() {
        let mut kv = MemoryKv::default();
        kv.set(SIGNALS_KEY, "not even json").unwrap();
        kv.set(MUTES_KEY, "[1, 2, 3]").unwrap();

        let now = Utc::now();
        let mut store = SignalStore::new(kv, None);
        assert!(store.signals_for_today(now).is_empty());
        assert!(store.mute_list().is_empty());
        // And the store still works.
        assert!(store.insert(signal("m1", "t1", now), now));
    }

    #[test]
    fn mute_expiry_resurfaces_old_threads() {
        let now = Utc::now();
        let mut store = SignalStore::new(MemoryKv::default(), Some(7));
        store.insert(signal("m1", "t1", now), now);
        store.dismiss("m1", now);

        let much_later = now + Duration::days(8);
        assert!(store.insert(signal("m2", "t1", much_later), much_later));
    }

    #[test]
    fn reset_clears_everything() {
        let now = Utc::now();
        let mut store = SignalStore::new(MemoryKv::default(), None);
        store.insert(signal("m1", "t1", now), now);
        store.dismiss("m1", now);
        store.reset();
        assert!(!store.is_dismissed("m1"));
        assert!(store.mute_list().is_empty());
        assert!(store.signals_for_today(now).is_empty());
    }
}
