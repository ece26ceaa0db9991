//! tiercache - Two-Tier Application Cache
//!
//! A cache facade for application code: a process-local tier promoted by
//! read frequency, in front of one shared backend selected at startup.
//!
//! # Read path
//!
//! ```text
//! Key Codec → Process Tier → Shared Backend (Redis / File / Memory)
//! ```
//!
//! # Features
//!
//! - Hit-count promotion into the process-local tier
//! - Write-through with TTL, calendar intervals and absolute dates
//! - Ordered, memoized backend discovery
//! - File-name-safe key derivation
//! - Activation policy for admins and developers
//! - Redis backend (`redis-backend` feature)
//!
//! # Modules
//!
//! - [`cache`] - Facade, tier, backends and backend selection
//! - [`error`] - Error types

pub mod cache;
pub mod error;

pub use cache::{
    ActivationContext, BackendSelector, CacheConfig, CacheFacade, Expiry, ProcessTier,
};
pub use error::{Error, Result};
