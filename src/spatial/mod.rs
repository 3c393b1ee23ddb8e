//! Nearest-site lookup and bounding-box search
//!
//! - [`kdtree`]: the balanced two-dimensional index
//! - [`fingerprint`]: cache keys derived from the stores a composition spans
//! - [`cache`]: persistence of built indexes across processes

pub mod cache;
pub mod fingerprint;
pub mod kdtree;

pub use self::cache::{CacheBackend, DiskCacheBackend, IndexCache, MemoryCacheBackend, NoOpCacheBackend};
pub use self::fingerprint::Fingerprint;
pub use self::kdtree::KdTree;
