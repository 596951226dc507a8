//! Entry cache: decoded values for the keys the caller asked to keep.
//!
//! Retention is caller-directed. The default [`Manual`] policy never evicts
//! on its own; entries leave only through [`EntryCache::evict`]. A bounded
//! policy such as [`Fifo`] can be plugged in when a fixed memory ceiling is
//! preferred over explicit unloading.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt,
    num::NonZeroUsize,
};

use crate::value::Value;

/// Decides which entries leave the cache without an explicit unload.
pub trait EvictionPolicy: fmt::Debug + Send {
    /// Called after `key` was inserted, with the cache now holding `len`
    /// entries. Returns the keys to evict; `key` itself must not be among
    /// them.
    fn admitted(&mut self, key: &str, len: usize) -> Vec<String>;

    /// Called whenever `key` leaves the cache, for any reason.
    fn removed(&mut self, key: &str);
}

/// Never evicts. Everything cached stays until unloaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Manual;

impl EvictionPolicy for Manual {
    fn admitted(&mut self, _key: &str, _len: usize) -> Vec<String> {
        Vec::new()
    }

    fn removed(&mut self, _key: &str) {}
}

/// Keeps at most `capacity` entries, evicting the oldest admitted first.
///
/// Re-populating a key that is still cached does not refresh its age.
/// Admission, removal and eviction are amortized O(1): removals only drop the
/// key from `live`, and the stale queue slot is skipped when it reaches the
/// front.
#[derive(Debug, Clone)]
pub struct Fifo {
    capacity: NonZeroUsize,
    /// Admission sequence number of every cached key.
    live: HashMap<String, u64>,
    /// Keys in admission order, tagged with the sequence they were admitted
    /// under. A slot whose tag no longer matches `live` is stale.
    order: VecDeque<(u64, String)>,
    next: u64,
}

impl Fifo {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            live: HashMap::new(),
            order: VecDeque::new(),
            next: 0,
        }
    }

    fn is_live(&self, seq: u64, key: &str) -> bool {
        self.live.get(key) == Some(&seq)
    }

    /// Drops stale slots once they outnumber the live ones.
    fn compact(&mut self) {
        if self.order.len() > 2 * self.live.len() + 16 {
            let live = &self.live;
            self.order.retain(|(seq, key)| live.get(key) == Some(seq));
        }
    }
}

impl EvictionPolicy for Fifo {
    fn admitted(&mut self, key: &str, len: usize) -> Vec<String> {
        if !self.live.contains_key(key) {
            let seq = self.next;
            self.next += 1;
            self.live.insert(key.to_string(), seq);
            self.order.push_back((seq, key.to_string()));
        }
        let excess = len.saturating_sub(self.capacity.get());
        let mut victims = Vec::with_capacity(excess);
        let mut kept = None;
        while victims.len() < excess {
            let Some((seq, oldest)) = self.order.pop_front() else {
                break;
            };
            if !self.is_live(seq, &oldest) {
                continue;
            }
            if oldest == key {
                kept = Some((seq, oldest));
                continue;
            }
            self.live.remove(&oldest);
            victims.push(oldest);
        }
        if let Some(slot) = kept {
            self.order.push_front(slot);
        }
        victims
    }

    fn removed(&mut self, key: &str) {
        if self.live.remove(key).is_some() {
            self.compact();
        }
    }
}

#[derive(Debug)]
struct Slot {
    /// When the key entered the cache; kept across re-population.
    admitted: u64,
    value: Value,
}

#[derive(Debug)]
pub struct EntryCache {
    entries: BTreeMap<String, Slot>,
    policy: Box<dyn EvictionPolicy>,
    next: u64,
}

impl Default for EntryCache {
    fn default() -> Self {
        Self::new(Box::new(Manual))
    }
}

impl EntryCache {
    pub fn new(policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            entries: BTreeMap::new(),
            policy,
            next: 0,
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Returns the keys the policy evicted to make room.
    pub fn populate(&mut self, key: String, value: Value) -> Vec<String> {
        let len = self.entries.len() + usize::from(!self.entries.contains_key(&key));
        let victims = self.policy.admitted(&key, len);
        match self.entries.get_mut(&key) {
            Some(slot) => slot.value = value,
            None => {
                let admitted = self.next;
                self.next += 1;
                self.entries.insert(key, Slot { admitted, value });
            }
        }
        for victim in &victims {
            self.entries.remove(victim);
        }
        victims
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Removes `key` if present. Evicting an absent key does nothing.
    pub fn evict(&mut self, key: &str) -> Option<Value> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.policy.removed(key);
        }
        removed.map(|slot| slot.value)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Cached entries, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, slot)| (k.as_str(), &slot.value))
    }

    /// Replaces the policy, admitting the current entries to it in the order
    /// they were first cached.
    ///
    /// Returns the keys the new policy evicted.
    pub fn set_policy(&mut self, policy: Box<dyn EvictionPolicy>) -> Vec<String> {
        self.policy = policy;
        let mut keys: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(k, slot)| (slot.admitted, k.clone()))
            .collect();
        keys.sort_unstable_by_key(|(admitted, _)| *admitted);
        let mut evicted = Vec::new();
        for (i, (_, key)) in keys.iter().enumerate() {
            for victim in self.policy.admitted(key, i + 1 - evicted.len()) {
                self.entries.remove(&victim);
                evicted.push(victim);
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_is_idempotent_and_evict_is_forgiving() {
        let mut cache = EntryCache::default();
        assert!(cache.populate("a".into(), Value::from(1u64)).is_empty());
        assert!(cache.populate("a".into(), Value::from(2u64)).is_empty());
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get("a"), Some(&Value::from(2u64)));

        assert_eq!(cache.evict("a"), Some(Value::from(2u64)));
        assert_eq!(cache.evict("a"), None);
        assert_eq!(cache.evict("never"), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn fifo_evicts_oldest_beyond_capacity() {
        let mut cache = EntryCache::new(Box::new(Fifo::new(NonZeroUsize::new(2).unwrap())));
        assert!(cache.populate("a".into(), Value::Null).is_empty());
        assert!(cache.populate("b".into(), Value::Null).is_empty());
        // Re-populating does not change the count or the order.
        assert!(cache.populate("a".into(), Value::from(true)).is_empty());
        assert_eq!(cache.populate("c".into(), Value::Null), ["a"]);
        assert_eq!(cache.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["b", "c"]);

        // Explicit eviction frees a slot without a policy victim.
        cache.evict("b");
        assert!(cache.populate("d".into(), Value::Null).is_empty());
        assert_eq!(cache.populate("e".into(), Value::Null), ["c"]);
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn swapping_policy_admits_existing_entries() {
        let mut cache = EntryCache::default();
        for key in ["a", "b", "c"] {
            cache.populate(key.into(), Value::Null);
        }
        let evicted = cache.set_policy(Box::new(Fifo::new(NonZeroUsize::new(2).unwrap())));
        assert_eq!(evicted, ["a"]);
        assert_eq!(cache.populate("d".into(), Value::Null), ["b"]);
    }

    #[test]
    fn swapping_policy_follows_caching_order() {
        let mut cache = EntryCache::default();
        for key in ["z", "a", "m"] {
            cache.populate(key.into(), Value::Null);
        }
        // Re-populating keeps the original age.
        cache.populate("z".into(), Value::from(true));
        let evicted = cache.set_policy(Box::new(Fifo::new(NonZeroUsize::new(2).unwrap())));
        assert_eq!(evicted, ["z"]);
        assert_eq!(cache.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["a", "m"]);
        assert_eq!(cache.populate("b".into(), Value::Null), ["a"]);
    }

    #[test]
    fn fifo_readmitted_key_is_youngest() {
        let mut policy = Fifo::new(NonZeroUsize::new(2).unwrap());
        assert!(policy.admitted("a", 1).is_empty());
        assert!(policy.admitted("b", 2).is_empty());
        policy.removed("a");
        assert!(policy.admitted("a", 2).is_empty());
        // The slot "a" held before its removal is stale, so "b" is oldest.
        assert_eq!(policy.admitted("c", 3), ["b"]);
        assert_eq!(policy.admitted("d", 3), ["a"]);
    }

    #[test]
    fn fifo_stays_linear_under_churn() {
        let n = 200_000;
        let mut cache = EntryCache::new(Box::new(Fifo::new(NonZeroUsize::new(n).unwrap())));
        for i in 0..n {
            assert!(cache.populate(format!("k{i}"), Value::Null).is_empty());
        }
        for i in (0..n).step_by(2) {
            cache.evict(&format!("k{i}"));
        }
        assert_eq!(cache.size(), n / 2);
        for i in n..n + n / 2 {
            assert!(cache.populate(format!("k{i}"), Value::Null).is_empty());
        }
        assert_eq!(cache.populate("over".into(), Value::Null), ["k1"]);
        assert_eq!(cache.size(), n);
    }

    #[test]
    fn fifo_capacity_one_never_evicts_the_newcomer() {
        let mut policy = Fifo::new(NonZeroUsize::MIN);
        assert!(policy.admitted("a", 1).is_empty());
        assert_eq!(policy.admitted("b", 2), ["a"]);
        assert!(policy.admitted("b", 1).is_empty());
    }
}
