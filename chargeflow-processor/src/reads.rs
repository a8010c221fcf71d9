//! Cache-wrapped read services

use chargeflow_core::{
    ChargeResult, FieldValue, KeyedMaxAgeCache, MaxAgeCache, Station, StationStatus,
    LIVE_READ_MAX_AGE_SECS, SLOW_READ_MAX_AGE_SECS,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::metrics::ProcessorMetrics;
use crate::storage::{RecordSet, SessionStore};

/// Read operations shielded by per-endpoint caches.
///
/// Column headers and the user list refresh at most every 30 minutes;
/// record and station reads every 5 seconds. Per-user reads get one
/// cache instance per user. A failed read is logged and degrades to an
/// empty value, which is cached like any other result until it expires.
/// Feature extraction is deliberately uncached and surfaces its errors.
pub struct CachedReads {
    store: Arc<SessionStore>,
    metrics: Arc<ProcessorMetrics>,
    headers: MaxAgeCache<Vec<String>>,
    users: MaxAgeCache<Vec<String>>,
    all_records: MaxAgeCache<RecordSet>,
    stations: MaxAgeCache<Vec<Station>>,
    user_records: KeyedMaxAgeCache<RecordSet>,
    user_stations: KeyedMaxAgeCache<Vec<StationStatus>>,
}

impl CachedReads {
    pub fn new(store: Arc<SessionStore>, metrics: Arc<ProcessorMetrics>) -> Self {
        let slow = Duration::from_secs(SLOW_READ_MAX_AGE_SECS);
        let live = Duration::from_secs(LIVE_READ_MAX_AGE_SECS);
        Self {
            store,
            metrics,
            headers: MaxAgeCache::new(slow),
            users: MaxAgeCache::new(slow),
            all_records: MaxAgeCache::new(live),
            stations: MaxAgeCache::new(live),
            user_records: KeyedMaxAgeCache::new(live),
            user_stations: KeyedMaxAgeCache::new(live),
        }
    }

    pub async fn headers(&self) -> Vec<String> {
        self.mark_read();
        self.headers
            .get_with(|| async {
                match self.store.headers().await {
                    Ok(headers) => headers,
                    Err(e) => self.degrade("headers", e, Vec::new()),
                }
            })
            .await
    }

    pub async fn users(&self) -> Vec<String> {
        self.mark_read();
        self.users
            .get_with(|| async {
                match self.store.users().await {
                    Ok(users) => users,
                    Err(e) => self.degrade("users", e, Vec::new()),
                }
            })
            .await
    }

    pub async fn all_records(&self) -> RecordSet {
        self.mark_read();
        self.all_records
            .get_with(|| async {
                match self.store.all_records().await {
                    Ok(records) => records,
                    Err(e) => self.degrade("all records", e, RecordSet::empty()),
                }
            })
            .await
    }

    pub async fn records_for_user(&self, user_id: &str) -> RecordSet {
        self.mark_read();
        let cache = self.user_records.entry(user_id);
        cache
            .get_with(|| async {
                match self.store.records_for_user(user_id).await {
                    Ok(records) => records,
                    Err(e) => self.degrade("user records", e, RecordSet::empty()),
                }
            })
            .await
    }

    pub async fn stations(&self) -> Vec<Station> {
        self.mark_read();
        self.stations
            .get_with(|| async {
                match self.store.stations().await {
                    Ok(stations) => stations,
                    Err(e) => self.degrade("stations", e, Vec::new()),
                }
            })
            .await
    }

    pub async fn stations_for_user(&self, user_id: &str) -> Vec<StationStatus> {
        self.mark_read();
        let cache = self.user_stations.entry(user_id);
        cache
            .get_with(|| async {
                match self.store.stations_for_user(user_id).await {
                    Ok(stations) => stations,
                    Err(e) => self.degrade("user stations", e, Vec::new()),
                }
            })
            .await
    }

    /// Uncached: feature extraction errors must reach the caller intact
    pub async fn feature_values(
        &self,
        feature_x: &str,
        feature_y: &str,
    ) -> ChargeResult<Vec<(FieldValue, FieldValue)>> {
        self.mark_read();
        self.store.feature_values(feature_x, feature_y).await
    }

    fn mark_read(&self) {
        self.metrics.reads_served.fetch_add(1, Ordering::Relaxed);
    }

    fn degrade<T>(&self, operation: &str, error: chargeflow_core::ChargeError, empty: T) -> T {
        self.metrics.read_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Read '{}' failed, serving empty result: {}", operation, error);
        empty
    }
}
