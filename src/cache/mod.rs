//! Two-Tier Cache Facade
//!
//! A process-local tier in front of one shared backend chosen at startup.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          Cache Facade                                │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Key Codec           │ Process Tier          │ Shared Backend        │
//! │  ┌────────────────┐  │ ┌─────────────────┐   │ ┌─────────────────┐   │
//! │  │ prefix + key   │  │ │ DashMap slots   │   │ │ Redis / File /  │   │
//! │  │ (sanitized for │  │ │ value, expiry,  │   │ │ Memory adapter  │   │
//! │  │  file names)   │  │ │ hit count       │   │ │ + serializer    │   │
//! │  └────────────────┘  │ └─────────────────┘   │ └─────────────────┘   │
//! │                      │          ▲            │          │            │
//! │                      │          └── promote after N backend reads    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Backends are discovered once by [`BackendSelector`], highest priority
//! first. A backend that already lives in process memory reports
//! `uses_process_tier() == false` and is read directly.

mod activation;
mod backend;
mod clock;
mod config;
mod facade;
mod key;
mod metrics;
mod selector;
mod serializer;
mod tier;

pub use activation::{is_active, ActivationContext};
pub use backend::{BackendAdapter, BackendPair, FileBackend, MemoryBackend, MemoryBackendStats};
#[cfg(feature = "redis-backend")]
pub use backend::RedisBackend;
pub use clock::{expiry_after, Clock, ManualClock, SystemClock};
pub use config::{BackendsConfig, CacheConfig, NamespaceConfig};
pub use facade::{is_falsy, CacheFacade, CacheFacadeBuilder, CalendarInterval, Expiry};
pub use key::KeyCodec;
pub use metrics::{FacadeMetrics, MetricsSnapshot};
#[cfg(feature = "redis-backend")]
pub use selector::RedisCandidate;
pub use selector::{BackendCandidate, BackendSelector, FileCandidate, MemoryCandidate};
pub use serializer::{default_serializer, JsonSerializer, MessagePackSerializer, Serializer};
pub use tier::{ProcessTier, TierEntry, DEFAULT_HIT_THRESHOLD};
