//! Time-limited ticker data cache
//!
//! Expiry is checked lazily on read. Stale entries are never purged, only
//! superseded by the next put for the same symbol.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Source of "now" for expiry checks
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub fetched_at: DateTime<Utc>,
}

/// Symbol-keyed cache; keys are stored uppercase
pub struct TickerCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TickerCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    pub fn put(&mut self, symbol: &str, payload: T) {
        let entry = CacheEntry {
            payload,
            fetched_at: self.clock.now(),
        };
        self.entries.insert(symbol.to_uppercase(), entry);
    }

    /// Cached payload if it is younger than `ttl`
    pub fn get(&self, symbol: &str, ttl: Duration) -> Option<T> {
        let entry = self.entries.get(&symbol.to_uppercase())?;

        // A fetch stamped in the future counts as brand new
        let age = (self.clock.now() - entry.fetched_at)
            .to_std()
            .unwrap_or_default();

        if age < ttl {
            Some(entry.payload.clone())
        } else {
            tracing::debug!("Cache entry for {} expired ({:?} old)", symbol, age);
            None
        }
    }

    /// Number of entries, stale ones included
    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T> fmt::Debug for TickerCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickerCache")
            .field("symbols", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: std::sync::Mutex::new(Utc::now()),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
