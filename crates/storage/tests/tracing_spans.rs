//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans on ticket store operations.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use arca_wsaa_storage::{FileTicketStore, MemoryTicketStore, Ticket, TicketStore};
use chrono::{TimeDelta, Utc};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer that records span names as they are entered
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_store_save_and_load_create_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryTicketStore::new();
    let ticket = Ticket::builder()
        .service("wsfe")
        .raw_response("<loginTicketResponse/>")
        .server_expires_at(Utc::now() + TimeDelta::hours(1))
        .token("token")
        .sign("sign")
        .build()
        .expect("valid ticket");
    store.save("wsfe", &ticket).await.expect("save should succeed");
    let _ = store.load("wsfe").await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "save"), "expected a 'save' span, got: {recorded:?}");
    assert!(recorded.iter().any(|s| s == "load"), "expected a 'load' span, got: {recorded:?}");
}

#[tokio::test]
async fn file_store_load_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileTicketStore::new(dir.path());
    let _ = store.load("wsfe").await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "load"), "expected a 'load' span, got: {recorded:?}");
}
