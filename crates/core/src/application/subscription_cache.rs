// Per-batch subscription lookup memoization
//
// Scoped to one workspace batch: never shared across workspaces or cycles.

use crate::domain::WebhookSubscription;
use crate::error::Result;
use crate::port::SubscriptionRepository;
use std::collections::HashMap;

/// Collapses duplicate subscription lookups within one batch.
///
/// Misses (`None`) are cached too; repository errors are not, so a later
/// delivery in the batch retries the lookup.
pub struct SubscriptionCache<'a> {
    workspace_id: &'a str,
    repo: &'a dyn SubscriptionRepository,
    entries: HashMap<String, Option<WebhookSubscription>>,
}

impl<'a> SubscriptionCache<'a> {
    pub fn new(workspace_id: &'a str, repo: &'a dyn SubscriptionRepository) -> Self {
        Self {
            workspace_id,
            repo,
            entries: HashMap::new(),
        }
    }

    /// Resolve a subscription, hitting the repository only on first use
    pub async fn get(&mut self, subscription_id: &str) -> Result<Option<&WebhookSubscription>> {
        if !self.entries.contains_key(subscription_id) {
            let found = self
                .repo
                .find_by_id(self.workspace_id, subscription_id)
                .await?;
            self.entries.insert(subscription_id.to_string(), found);
        }
        Ok(self
            .entries
            .get(subscription_id)
            .and_then(|entry| entry.as_ref()))
    }

    /// Number of distinct subscription IDs resolved so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
