//! Startup reconciliation of webhook subscriptions.
//!
//! Runs once: reads the provider's subscriptions for the bridge's target
//! URL, then subscribes to whatever desired events are missing in a single
//! call. Drift after startup is not detected.

use crate::client::{FrontClient, WebhookSubscription};
use crate::error::Result;
use std::collections::BTreeSet;

/// What a reconciliation run changed
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Desired events that were not subscribed before this run
    pub missing: Vec<String>,
    /// Subscription created for the missing events, if any
    pub created: Option<WebhookSubscription>,
}

impl ReconcileOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct SubscriptionManager {
    client: FrontClient,
    target_url: String,
    desired: BTreeSet<String>,
}

impl SubscriptionManager {
    pub fn new<I, S>(client: FrontClient, target_url: impl Into<String>, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client,
            target_url: target_url.into(),
            desired: events.into_iter().map(Into::into).collect(),
        }
    }

    /// Every subscription the provider holds, across all pages
    async fn current_subscriptions(&self) -> Result<Vec<WebhookSubscription>> {
        let mut page = self.client.list_webhooks().await?;
        let mut subscriptions = std::mem::take(&mut page.results);

        while let Some(next) = page.next().map(str::to_string) {
            page = self.client.next_page(&next).await?;
            subscriptions.append(&mut page.results);
        }

        Ok(subscriptions)
    }

    /// Subscribe to `desired - current` for the target URL
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let current: BTreeSet<String> = self
            .current_subscriptions()
            .await?
            .into_iter()
            .filter(|s| s.url == self.target_url)
            .flat_map(|s| s.events)
            .collect();

        let missing: Vec<String> = self.desired.difference(&current).cloned().collect();

        if missing.is_empty() {
            tracing::info!(
                target_url = %self.target_url,
                events = self.desired.len(),
                "Webhook subscriptions up to date"
            );
            return Ok(ReconcileOutcome {
                missing,
                created: None,
            });
        }

        let created = self.client.create_webhook(&self.target_url, &missing).await?;
        tracing::info!(
            target_url = %self.target_url,
            subscription_id = %created.id,
            added = ?missing,
            "Subscribed to missing webhook events"
        );

        Ok(ReconcileOutcome {
            missing,
            created: Some(created),
        })
    }
}
