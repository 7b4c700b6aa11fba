//! Collaborators the dispatcher acts on
//!
//! The client application owns the real implementations (auth store, query
//! cache, toast UI). The in-memory ones here back headless clients and tests.

use event_schema::EnquiryPayload;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Source of the current bearer token
pub trait AuthStore: Send + Sync {
    fn token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Drop credentials
    fn logout(&self);
}

/// Cached query groups a notification can make stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CachePartition {
    UserActivities,
    Enquiries,
    UserNotifications,
}

impl CachePartition {
    pub const ALL: [CachePartition; 3] = [
        CachePartition::UserActivities,
        CachePartition::Enquiries,
        CachePartition::UserNotifications,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CachePartition::UserActivities => "user.activities",
            CachePartition::Enquiries => "enquiries",
            CachePartition::UserNotifications => "user.notifications",
        }
    }
}

impl fmt::Display for CachePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub trait QueryCache: Send + Sync {
    fn invalidate(&self, partition: CachePartition);

    /// Drop every cached query
    fn clear(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

pub trait Toaster: Send + Sync {
    fn toast(&self, severity: Severity, message: &str);
}

/// Local enquiry state
pub trait EnquiryStore: Send + Sync {
    fn merge(&self, enquiry: EnquiryPayload);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Toasts written to the log, for clients without a UI
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingToaster;

impl Toaster for TracingToaster {
    fn toast(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(toast = message),
            Severity::Warning => tracing::warn!(toast = message),
            Severity::Error => tracing::error!(toast = message),
        }
    }
}

/// Per-partition version counters
///
/// Readers compare the version they fetched at with the current one; any
/// bump means the cached data is stale.
#[derive(Debug, Default)]
pub struct InMemoryQueryCache {
    versions: Mutex<HashMap<CachePartition, u64>>,
    clears: Mutex<u64>,
}

impl InMemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, partition: CachePartition) -> u64 {
        lock(&self.versions).get(&partition).copied().unwrap_or(0)
    }

    pub fn clear_count(&self) -> u64 {
        *lock(&self.clears)
    }
}

impl QueryCache for InMemoryQueryCache {
    fn invalidate(&self, partition: CachePartition) {
        *lock(&self.versions).entry(partition).or_insert(0) += 1;
        tracing::debug!(partition = partition.key(), "Query cache invalidated");
    }

    fn clear(&self) {
        let mut versions = lock(&self.versions);
        for partition in CachePartition::ALL {
            *versions.entry(partition).or_insert(0) += 1;
        }
        *lock(&self.clears) += 1;
        tracing::debug!("Query cache cleared");
    }
}

/// Enquiries keyed by id; later notifications overlay earlier ones
#[derive(Debug, Default)]
pub struct InMemoryEnquiryStore {
    enquiries: Mutex<BTreeMap<String, EnquiryPayload>>,
}

impl InMemoryEnquiryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<EnquiryPayload> {
        lock(&self.enquiries).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.enquiries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EnquiryStore for InMemoryEnquiryStore {
    fn merge(&self, enquiry: EnquiryPayload) {
        let Some(id) = enquiry.id.clone() else {
            tracing::debug!("Enquiry without id not merged into local state");
            return;
        };

        lock(&self.enquiries)
            .entry(id)
            .and_modify(|existing| existing.merge_from(enquiry.clone()))
            .or_insert(enquiry);
    }
}
