//! Resource store clients for workflow runs.
//!
//! Provides the [`RunStore`] trait consumed by the reaper and the result
//! extractor, a Kubernetes REST implementation, and an in-memory store.

pub mod error;
pub mod http;
pub mod memory;
pub mod selector;
pub mod store;

pub use error::ClientError;
pub use http::{KubeClient, KubeConfig, ResourcePath};
pub use memory::InMemoryStore;
pub use selector::{LabelSelector, Requirement, SelectorError};
pub use store::RunStore;
