// Delivery dispatcher
//
// One dispatch cycle per event:
//   1. serialize the envelope once and push it to every open admin stream
//   2. resolve active subscribers for the event name (fresh, no cache)
//   3. POST to every subscriber concurrently and wait for all to settle
//   4. log each outcome; no retry, nothing persisted
//
// No failure inside a cycle reaches the caller. One subscriber's error or
// timeout never delays or cancels another's attempt.

use futures::future::join_all;
use mailplate_core::{
    sign_payload, DeliveryError, DeliveryRequest, Event, EventName, Subscription,
    SubscriptionStore, WebhookTransport, EVENT_HEADER, SIGNATURE_HEADER,
};
use std::sync::Arc;

use super::streams::StreamManager;

/// Result of one delivery attempt
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub subscription_id: i64,
    pub url: String,
    /// Response status on success
    pub result: Result<u16, DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of a settled dispatch cycle
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event: EventName,
    /// Admin streams that accepted the frame
    pub streams_notified: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    fn new(event: EventName) -> Self {
        Self {
            event,
            streams_notified: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Fans events out to admin streams and webhook subscribers
pub struct Dispatcher {
    streams: Arc<StreamManager>,
    store: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn WebhookTransport>,
}

impl Dispatcher {
    pub fn new(
        streams: Arc<StreamManager>,
        store: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            streams,
            store,
            transport,
        }
    }

    /// Run one dispatch cycle to settlement
    pub async fn handle(&self, event: &Event) -> DispatchReport {
        let mut report = DispatchReport::new(event.event);

        let body = match event.to_json_bytes() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    event = %event.event,
                    error = %e,
                    "Failed to serialize event envelope"
                );
                return report;
            }
        };

        // serde_json output is UTF-8, so the frame text is the body verbatim
        let frame = String::from_utf8_lossy(&body);
        report.streams_notified = self.streams.broadcast(Arc::from(frame.as_ref()));

        let subscribers = match self.store.list_active_subscribers_for(event.event).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::warn!(
                    event = %event.event,
                    error = %e,
                    "Failed to resolve webhook subscribers"
                );
                return report;
            }
        };

        if subscribers.is_empty() {
            tracing::debug!(
                event = %event.event,
                streams = report.streams_notified,
                "No webhook subscribers"
            );
            return report;
        }

        let attempts = subscribers
            .iter()
            .map(|subscription| self.deliver(event.event, subscription, &body));
        report.outcomes = join_all(attempts).await;

        tracing::debug!(
            event = %event.event,
            streams = report.streams_notified,
            delivered = report.succeeded(),
            failed = report.failed(),
            "Dispatch cycle settled"
        );

        report
    }

    async fn deliver(
        &self,
        event: EventName,
        subscription: &Subscription,
        body: &[u8],
    ) -> DeliveryOutcome {
        let request = build_request(event, subscription, body);
        let result = self.transport.send(request).await;

        match &result {
            Ok(status) => tracing::info!(
                event = %event,
                subscription_id = subscription.id,
                url = %subscription.url,
                status,
                "Webhook delivered"
            ),
            Err(e) => tracing::warn!(
                event = %event,
                subscription_id = subscription.id,
                url = %subscription.url,
                error = %e,
                "Webhook delivery failed"
            ),
        }

        DeliveryOutcome {
            subscription_id: subscription.id,
            url: subscription.url.clone(),
            result,
        }
    }
}

/// Build the POST for one subscriber from the already serialized body
pub fn build_request(
    event: EventName,
    subscription: &Subscription,
    body: &[u8],
) -> DeliveryRequest {
    let mut headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        (EVENT_HEADER.to_string(), event.to_string()),
    ];

    if let Some(secret) = &subscription.secret {
        headers.push((SIGNATURE_HEADER.to_string(), sign_payload(secret, body)));
    }

    DeliveryRequest {
        url: subscription.url.clone(),
        headers,
        body: body.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailplate_core::{
        verify_signature, DomainError, InMemorySubscriptionStore, NewSubscription,
        SubscriptionPatch,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::Notify;

    /// Records every request; answers with a per-URL canned result
    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<DeliveryRequest>>,
        responses: Mutex<HashMap<String, Result<u16, DeliveryError>>>,
    }

    impl RecordingTransport {
        fn respond(&self, url: &str, result: Result<u16, DeliveryError>) {
            self.responses.lock().insert(url.to_string(), result);
        }

        fn requests(&self) -> Vec<DeliveryRequest> {
            self.requests.lock().clone()
        }

        fn requests_to(&self, url: &str) -> usize {
            self.requests.lock().iter().filter(|r| r.url == url).count()
        }
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn send(&self, request: DeliveryRequest) -> Result<u16, DeliveryError> {
            let result = self
                .responses
                .lock()
                .get(&request.url)
                .cloned()
                .unwrap_or(Ok(200));
            self.requests.lock().push(request);
            result
        }
    }

    struct FailingStore;

    #[async_trait]
    impl SubscriptionStore for FailingStore {
        async fn register(&self, _: NewSubscription) -> mailplate_core::Result<Subscription> {
            unimplemented!()
        }
        async fn get(&self, id: i64) -> mailplate_core::Result<Subscription> {
            Err(DomainError::not_found("Subscription", id))
        }
        async fn list_for_owner(&self, _: i64) -> mailplate_core::Result<Vec<Subscription>> {
            Ok(vec![])
        }
        async fn list_all(&self) -> mailplate_core::Result<Vec<Subscription>> {
            Ok(vec![])
        }
        async fn list_active_subscribers_for(
            &self,
            _: EventName,
        ) -> mailplate_core::Result<Vec<Subscription>> {
            Err(anyhow::anyhow!("registry unavailable").into())
        }
        async fn update(
            &self,
            id: i64,
            _: SubscriptionPatch,
        ) -> mailplate_core::Result<Subscription> {
            Err(DomainError::not_found("Subscription", id))
        }
        async fn remove(&self, id: i64) -> mailplate_core::Result<()> {
            Err(DomainError::not_found("Subscription", id))
        }
    }

    struct Harness {
        streams: Arc<StreamManager>,
        store: Arc<InMemorySubscriptionStore>,
        transport: Arc<RecordingTransport>,
        dispatcher: Dispatcher,
    }

    fn harness() -> Harness {
        let streams = Arc::new(StreamManager::new(16));
        let store = Arc::new(InMemorySubscriptionStore::new());
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(streams.clone(), store.clone(), transport.clone());
        Harness {
            streams,
            store,
            transport,
            dispatcher,
        }
    }

    async fn subscribe(
        store: &InMemorySubscriptionStore,
        url: &str,
        events: Vec<EventName>,
        secret: Option<&str>,
    ) -> Subscription {
        store
            .register(NewSubscription {
                owner_id: 1,
                url: url.to_string(),
                events,
                secret: secret.map(str::to_string),
            })
            .await
            .unwrap()
    }

    fn category_created() -> Event {
        Event::new(
            EventName::CategoryCreated,
            json!({"id": 1, "name": "Invoices"}),
        )
    }

    #[tokio::test]
    async fn test_one_post_per_matching_active_subscription() {
        let h = harness();
        subscribe(&h.store, "https://a.test/hook", vec![EventName::CategoryCreated], None).await;
        subscribe(
            &h.store,
            "https://b.test/hook",
            vec![EventName::CategoryCreated, EventName::TemplateCreated],
            None,
        )
        .await;
        subscribe(&h.store, "https://c.test/hook", vec![EventName::TemplateCreated], None).await;

        let report = h.dispatcher.handle(&category_created()).await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(h.transport.requests_to("https://a.test/hook"), 1);
        assert_eq!(h.transport.requests_to("https://b.test/hook"), 1);
        assert_eq!(h.transport.requests_to("https://c.test/hook"), 0);
    }

    #[tokio::test]
    async fn test_inactive_subscription_never_receives() {
        let h = harness();
        let sub = subscribe(
            &h.store,
            "https://a.test/hook",
            vec![EventName::CategoryCreated],
            None,
        )
        .await;
        h.store
            .update(
                sub.id,
                SubscriptionPatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let report = h.dispatcher.handle(&category_created()).await;
        assert!(report.outcomes.is_empty());
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_request_headers_and_signature() {
        let h = harness();
        subscribe(
            &h.store,
            "https://x.test/hook",
            vec![EventName::CategoryCreated],
            Some("s3cret"),
        )
        .await;
        subscribe(&h.store, "https://y.test/hook", vec![EventName::CategoryCreated], None).await;

        let event = category_created();
        h.dispatcher.handle(&event).await;

        let requests = h.transport.requests();
        let signed = requests.iter().find(|r| r.url == "https://x.test/hook").unwrap();
        let unsigned = requests.iter().find(|r| r.url == "https://y.test/hook").unwrap();

        assert_eq!(signed.header("content-type"), Some("application/json"));
        assert_eq!(signed.header(EVENT_HEADER), Some("category.created"));

        let signature = signed.header(SIGNATURE_HEADER).unwrap();
        assert_eq!(signature, sign_payload("s3cret", &signed.body));
        assert!(verify_signature("s3cret", &signed.body, signature));

        let mut tampered = signed.body.clone();
        tampered[0] = b' ';
        assert!(!verify_signature("s3cret", &tampered, signature));

        assert!(unsigned.header(SIGNATURE_HEADER).is_none());
        // Same bytes go to every subscriber
        assert_eq!(signed.body, unsigned.body);
        assert_eq!(Event::from_json_slice(&signed.body).unwrap(), event);
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_sibling() {
        let h = harness();
        subscribe(&h.store, "https://a.test/hook", vec![EventName::CategoryCreated], None).await;
        subscribe(&h.store, "https://b.test/hook", vec![EventName::CategoryCreated], None).await;
        h.transport
            .respond("https://a.test/hook", Err(DeliveryError::Status(500)));

        let report = h.dispatcher.handle(&category_created()).await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed(), 1);
        let a = report
            .outcomes
            .iter()
            .find(|o| o.url == "https://a.test/hook")
            .unwrap();
        let b = report
            .outcomes
            .iter()
            .find(|o| o.url == "https://b.test/hook")
            .unwrap();
        assert_eq!(a.result, Err(DeliveryError::Status(500)));
        assert_eq!(b.result, Ok(200));
    }

    #[tokio::test]
    async fn test_streams_receive_data_before_deliveries() {
        let h = harness();
        let (_guard, mut rx) = h.streams.connect(1);

        let first = category_created();
        let second = Event::new(EventName::CategoryDeleted, json!({"id": 1}));
        let report = h.dispatcher.handle(&first).await;
        h.dispatcher.handle(&second).await;

        assert_eq!(report.streams_notified, 1);
        let frame1 = rx.recv().await.unwrap();
        let frame2 = rx.recv().await.unwrap();
        assert_eq!(Event::from_json_slice(frame1.as_bytes()).unwrap(), first);
        assert_eq!(Event::from_json_slice(frame2.as_bytes()).unwrap(), second);
    }

    #[tokio::test]
    async fn test_disconnected_stream_is_dropped_without_error() {
        let h = harness();
        let (_guard, rx) = h.streams.connect(1);
        drop(rx);

        let report = h.dispatcher.handle(&category_created()).await;
        assert_eq!(report.streams_notified, 0);
        assert!(h.streams.is_empty());
    }

    #[tokio::test]
    async fn test_store_error_ends_cycle_quietly() {
        let streams = Arc::new(StreamManager::new(4));
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher =
            Dispatcher::new(streams.clone(), Arc::new(FailingStore), transport.clone());
        let (_guard, mut rx) = streams.connect(1);

        let report = dispatcher.handle(&category_created()).await;

        assert!(report.outcomes.is_empty());
        assert!(transport.requests().is_empty());
        // Stream fan-out happened before resolution failed
        assert!(rx.recv().await.is_some());
    }

    /// Blocks inside `send` until released
    struct GatedTransport {
        entered: Notify,
        release: Notify,
        inner: RecordingTransport,
    }

    #[async_trait]
    impl WebhookTransport for GatedTransport {
        async fn send(&self, request: DeliveryRequest) -> Result<u16, DeliveryError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.send(request).await
        }
    }

    #[tokio::test]
    async fn test_subscription_removed_mid_flight_still_completes() {
        let streams = Arc::new(StreamManager::new(4));
        let store = Arc::new(InMemorySubscriptionStore::new());
        let transport = Arc::new(GatedTransport {
            entered: Notify::new(),
            release: Notify::new(),
            inner: RecordingTransport::default(),
        });
        let dispatcher = Arc::new(Dispatcher::new(streams, store.clone(), transport.clone()));
        let sub = subscribe(
            &store,
            "https://a.test/hook",
            vec![EventName::CategoryCreated],
            None,
        )
        .await;

        let cycle = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.handle(&category_created()).await })
        };

        transport.entered.notified().await;
        store.remove(sub.id).await.unwrap();
        transport.release.notify_one();

        let report = cycle.await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].result, Ok(200));

        // The next cycle no longer sees the subscription
        let report = dispatcher.handle(&category_created()).await;
        assert!(report.outcomes.is_empty());
        assert_eq!(transport.inner.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_frame_and_webhook_body_share_bytes() {
        let h = harness();
        subscribe(
            &h.store,
            "https://a.test/hook",
            vec![EventName::CategoryCreated],
            Some("s3cret"),
        )
        .await;
        let (_guard, mut frames) = h.streams.connect(1);

        let event = category_created();
        h.dispatcher.handle(&event).await;

        let expected = event.to_json_bytes().unwrap();
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.as_bytes(), &expected[..]);

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, expected);
        let signature = requests[0].header(SIGNATURE_HEADER).unwrap();
        assert!(verify_signature("s3cret", frame.as_bytes(), signature));
    }
}
