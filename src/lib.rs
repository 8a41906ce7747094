//! Caching proxy for movie and TV metadata APIs.
//!
//! The [`cache::TieredCacheManager`] shields the upstream API from repeated
//! queries; [`catalog::Catalog`] is what request handlers call into.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod upstream;
