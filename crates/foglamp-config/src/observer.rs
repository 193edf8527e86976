//! `register_interest`/`unregister_interest`'s callback contract.

use async_trait::async_trait;

/// A resolvable callback registered against a category name.
///
/// Modeled as a trait object rather than a bare function pointer so plugins
/// and apps can close over their own state (grounded on the teacher's
/// `ConnectionHandler` trait in `alloy-core::adapter`).
#[async_trait]
pub trait CategoryObserver: Send + Sync {
    /// Invoked after a category commits a change, named `category`.
    async fn run(&self, category: &str);
}
