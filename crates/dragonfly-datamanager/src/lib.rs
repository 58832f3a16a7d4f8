//! Dragonfly Data Manager
//!
//! Reconciles `DataRequest`s into rendered boot documents. Addresses come
//! from IP pools served by an external allocator; the data manager claims
//! them, waits for the allocator, renders the documents once every address
//! is known and stores them.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 DataManager                    │
//! │                                                │
//! │   PoolResolver ──▶ PoolCache ──▶ renderer      │
//! │        │                            │          │
//! │        ▼                            ▼          │
//! │  ┌──────────────────────────────────────────┐  │
//! │  │        DataStore + NodeLookup            │  │
//! │  │     MemoryStore | external object store  │  │
//! │  └──────────────────────────────────────────┘  │
//! │                                                │
//! │   ReleaseCoordinator (teardown)                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dragonfly_datamanager::{DataManager, MemoryStore, ReconcileOutcome};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let manager = DataManager::new(store.clone(), store);
//!
//! match manager.reconcile(&mut request).await? {
//!     ReconcileOutcome::Ready => {}
//!     ReconcileOutcome::RequeueAfter(delay) => schedule(request, delay),
//! }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod release;
pub mod resolver;
pub mod store;

pub use config::ManagerConfig;
pub use error::{DataError, Result};
pub use manager::{DataManager, ReconcileOutcome};
pub use release::{ReleaseCoordinator, ReleaseOutcome};
pub use resolver::{PoolResolver, Resolution};
pub use store::{DataStore, MemoryStore, NodeLookup, StoreError};
