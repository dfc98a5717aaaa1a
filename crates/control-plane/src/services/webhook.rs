// Webhook subscription service
// Decision: Owner or SUPERADMIN may read and change a subscription; list-all is SUPERADMIN-only
// Decision: Event names arrive as strings and are parsed against the catalog here

use mailplate_core::{
    DomainError, EventName, NewSubscription, Result, Subscription, SubscriptionPatch,
    SubscriptionStore,
};
use std::sync::Arc;

use crate::api::webhooks::{CreateWebhookRequest, UpdateWebhookRequest};
use crate::auth::AuthUser;

pub struct WebhookService {
    store: Arc<dyn SubscriptionStore>,
}

impl WebhookService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn register(
        &self,
        actor: &AuthUser,
        req: CreateWebhookRequest,
    ) -> Result<Subscription> {
        let subscription = self
            .store
            .register(NewSubscription {
                owner_id: actor.id,
                url: req.url,
                events: parse_event_names(&req.events)?,
                secret: req.secret,
            })
            .await?;

        tracing::info!(
            subscription_id = subscription.id,
            owner_id = actor.id,
            url = %subscription.url,
            events = subscription.subscribed_events.len(),
            "Webhook registered"
        );
        Ok(subscription)
    }

    pub async fn list_mine(&self, actor: &AuthUser) -> Result<Vec<Subscription>> {
        self.store.list_for_owner(actor.id).await
    }

    pub async fn list_all(&self, actor: &AuthUser) -> Result<Vec<Subscription>> {
        if !actor.is_superadmin() {
            return Err(DomainError::forbidden("SUPERADMIN access required"));
        }
        self.store.list_all().await
    }

    pub async fn get(&self, actor: &AuthUser, id: i64) -> Result<Subscription> {
        let subscription = self.store.get(id).await?;
        authorize(actor, &subscription)?;
        Ok(subscription)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i64,
        req: UpdateWebhookRequest,
    ) -> Result<Subscription> {
        self.get(actor, id).await?;

        let events = req
            .events
            .as_deref()
            .map(parse_event_names)
            .transpose()?;

        let subscription = self
            .store
            .update(
                id,
                SubscriptionPatch {
                    url: req.url,
                    events,
                    active: req.active,
                },
            )
            .await?;

        tracing::info!(
            subscription_id = id,
            active = subscription.active,
            "Webhook updated"
        );
        Ok(subscription)
    }

    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<()> {
        self.get(actor, id).await?;
        self.store.remove(id).await?;
        tracing::info!(subscription_id = id, "Webhook deleted");
        Ok(())
    }
}

fn authorize(actor: &AuthUser, subscription: &Subscription) -> Result<()> {
    if actor.can_manage(subscription.owner_id) {
        Ok(())
    } else {
        Err(DomainError::forbidden(
            "You do not have access to this webhook",
        ))
    }
}

fn parse_event_names(names: &[String]) -> Result<Vec<EventName>> {
    names.iter().map(|name| name.trim().parse()).collect()
}
