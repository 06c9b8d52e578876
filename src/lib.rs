//! Vantage: Perspective-Aware Content Resolution
//!
//! Sits between an application and a versioned document store holding draft
//! and published variants of the same logical document. Every read names an
//! explicit perspective; list reads and single-document reads resolve through
//! the same policy, so a document listed under a perspective is always
//! fetchable by key under that perspective, with the same variant.

pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod logging;
pub mod perspective;
pub mod policy;
pub mod query;
pub mod resolver;
pub mod service;

pub use cache::{ConsistencyCache, InvalidationScope};
pub use document::{PublishMetadata, RawRecord, ResolvedDocument, Revision, Variant};
pub use error::{IdentityError, ResolveError};
pub use fetcher::{DocumentStore, InMemoryStore, StoreFetcher, VariantFetcher};
pub use identity::{LogicalKey, VariantStatus};
pub use perspective::Perspective;
pub use query::{Filter, ListQuery};
pub use resolver::Resolver;
pub use service::ContentService;
