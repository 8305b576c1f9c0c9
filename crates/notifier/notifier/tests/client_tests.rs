//! Integration tests for retry, cancellation and transport handling.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use alertbridge_notifier::{
    AttemptRecord, DeliveryContext, DeliveryError, DeliveryObserver, DeliveryOutcome, Event,
    ExponentialBackoff, FixedDelay, Notifier, NotifierConfig, NotifierResult, ObjectReference,
    ResilientClient, Rollbar, Severity, TransportConfig, TrustStore,
};
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use uuid::Uuid;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn error_event() -> Event {
    Event::new(
        ObjectReference::new("Kustomization", "apps", "flux-system"),
        Severity::Error,
        "health check failed",
    )
}

fn retry(max_attempts: u32, base: Duration) -> ExponentialBackoff {
    ExponentialBackoff::new()
        .base(base)
        .max_delay(Duration::from_secs(1))
        .max_attempts(max_attempts)
        .jitter(0.0)
}

fn rollbar(url: String, backoff: ExponentialBackoff) -> Rollbar {
    Rollbar::new(
        NotifierConfig::new("test_token")
            .with_target_url(url)
            .with_retry(backoff),
    )
    .unwrap()
}

/// Installs a test log subscriber; `RUST_LOG=alertbridge_notifier=debug` shows attempts.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[derive(Default)]
struct RecordingObserver {
    attempts: Mutex<Vec<AttemptRecord>>,
    outcomes: Mutex<Vec<(&'static str, bool)>>,
}

impl DeliveryObserver for RecordingObserver {
    fn on_attempt(&self, record: &AttemptRecord) {
        self.attempts.lock().unwrap().push(record.clone());
    }

    fn on_outcome(&self, provider: &'static str, result: &NotifierResult<DeliveryOutcome>) {
        self.outcomes.lock().unwrap().push((provider, result.is_ok()));
    }
}

mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_retries_server_errors_until_success() {
        init_tracing();
        for attempts in 1..=4u32 {
            let server = MockServer::start().await;
            if attempts > 1 {
                Mock::given(method("POST"))
                    .respond_with(ResponseTemplate::new(500))
                    .up_to_n_times(u64::from(attempts - 1))
                    .mount(&server)
                    .await;
            }
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            let notifier = rollbar(server.uri(), retry(5, Duration::from_millis(10)));
            let outcome = notifier.post(&DeliveryContext::new(), &error_event()).await.unwrap();

            assert_eq!(outcome, DeliveryOutcome::Delivered { status: 200, attempts });
            assert_eq!(request_count(&server).await, attempts as usize);
        }
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid payload"))
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(5, Duration::from_millis(10)));
        let err = notifier
            .post(&DeliveryContext::new(), &error_event())
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Rejected { status: 400, attempts: 1, .. }));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_too_many_requests_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(3, Duration::from_millis(10)));
        let outcome = notifier.post(&DeliveryContext::new(), &error_event()).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Delivered { status: 200, attempts: 2 });
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(3, Duration::from_millis(10)));
        let err = notifier
            .post(&DeliveryContext::new(), &error_event())
            .await
            .unwrap_err();

        match err {
            DeliveryError::RetriesExhausted { attempts, last_status, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, Some(503));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        // Bind and drop a listener to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let notifier = rollbar(
            format!("http://127.0.0.1:{port}/item"),
            retry(2, Duration::from_millis(10)),
        );
        let err = notifier
            .post(&DeliveryContext::new(), &error_event())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeliveryError::RetriesExhausted { attempts: 2, last_status: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_terminal_transport_error_keeps_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        // Every later request redirects to itself until the redirect limit trips.
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(307).insert_header("Location", format!("{}/item", server.uri())),
            )
            .mount(&server)
            .await;

        let notifier = rollbar(format!("{}/item", server.uri()), retry(5, Duration::from_millis(10)));
        let err = notifier
            .post(&DeliveryContext::new(), &error_event())
            .await
            .unwrap_err();

        match &err {
            DeliveryError::Request { attempts, last_status, message, .. } => {
                assert_eq!(*attempts, 3);
                assert_eq!(*last_status, Some(503));
                assert!(message.contains("redirect"), "unexpected message: {message}");
            }
            other => panic!("expected Request, got {other:?}"),
        }
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_observer_sees_every_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let observer = Arc::new(RecordingObserver::default());
        let notifier = rollbar(server.uri(), retry(3, Duration::from_millis(10)))
            .with_observer(observer.clone());

        notifier.post(&DeliveryContext::new(), &error_event()).await.unwrap();

        let attempts = observer.attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].attempt, 1);
        assert_eq!(attempts[0].status, Some(502));
        assert!(attempts[0].will_retry);
        assert_eq!(attempts[1].attempt, 2);
        assert_eq!(attempts[1].status, Some(200));
        assert!(!attempts[1].will_retry);
        assert_eq!(attempts[0].delivery_id, attempts[1].delivery_id);

        let outcomes = observer.outcomes.lock().unwrap().clone();
        assert_eq!(outcomes, vec![("rollbar", true)]);
    }
}

mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_requests() {
        init_tracing();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(10, Duration::from_millis(300)));
        let ctx = DeliveryContext::new();
        let handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.cancel();
        });

        let err = notifier.post(&ctx, &error_event()).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(matches!(
            err,
            DeliveryError::Cancelled { attempts: 1, last_status: Some(500), .. }
        ));

        // Nothing else goes out after the cancellation was observed.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(3, Duration::from_millis(10)));
        let ctx = DeliveryContext::new();
        let handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.cancel();
        });

        let started = Instant::now();
        let err = notifier.post(&ctx, &error_event()).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Cancelled { attempts: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_observer_records_interrupted_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let observer = Arc::new(RecordingObserver::default());
        let notifier = rollbar(server.uri(), retry(3, Duration::from_millis(10)))
            .with_observer(observer.clone());
        let ctx = DeliveryContext::new();
        let handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.cancel();
        });

        let err = notifier.post(&ctx, &error_event()).await.unwrap_err();

        let attempts = observer.attempts.lock().unwrap().clone();
        assert_eq!(attempts.len() as u32, err.attempts());
        assert_eq!(attempts[0].attempt, 1);
        assert_eq!(attempts[0].status, None);
        assert_eq!(attempts[0].error.as_deref(), Some("cancelled"));
        assert!(!attempts[0].will_retry);

        let outcomes = observer.outcomes.lock().unwrap().clone();
        assert_eq!(outcomes, vec![("rollbar", false)]);
    }

    #[tokio::test]
    async fn test_already_cancelled_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(3, Duration::from_millis(10)));
        let ctx = DeliveryContext::new();
        ctx.cancel();

        let err = notifier.post(&ctx, &error_event()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Cancelled { attempts: 0, .. }));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(50, Duration::from_millis(100)));
        let ctx = DeliveryContext::new().with_timeout(Duration::from_millis(250));

        let err = notifier.post(&ctx, &error_event()).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(matches!(err, DeliveryError::DeadlineExceeded { .. }));
        assert!(err.attempts() >= 1);
    }

    #[tokio::test]
    async fn test_cancellation_is_per_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let notifier = rollbar(server.uri(), retry(3, Duration::from_millis(10)));
        let cancelled = DeliveryContext::new();
        let live = DeliveryContext::new();

        let event = error_event();
        let (first, second) = tokio::join!(
            notifier.post(&cancelled, &event),
            async {
                cancelled.cancel();
                notifier.post(&live, &event).await
            }
        );

        assert!(first.unwrap_err().is_cancellation());
        assert!(second.unwrap().is_delivered());
    }
}

mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_go_through_proxy() {
        let proxy = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&proxy)
            .await;

        // The target host does not resolve; only the proxy can answer.
        let notifier = Rollbar::new(
            NotifierConfig::new("test_token")
                .with_target_url("http://rollbar.invalid/api/1/item/")
                .with_proxy_url(proxy.uri())
                .with_retry(retry(1, Duration::from_millis(10))),
        )
        .unwrap();

        let outcome = notifier.post(&DeliveryContext::new(), &error_event()).await.unwrap();
        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn test_tls_failure_is_retried() {
        // Plain HTTP server behind an https URL fails the TLS handshake.
        let server = MockServer::start().await;
        let store = TrustStore::from_pem_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/test-ca.pem"
        ))
        .unwrap();

        let url = server.uri().replacen("http://", "https://", 1);
        let notifier = Rollbar::new(
            NotifierConfig::new("test_token")
                .with_target_url(url)
                .with_trust_store(store)
                .with_retry(retry(2, Duration::from_millis(10))),
        )
        .unwrap();

        let err = notifier
            .post(&DeliveryContext::new(), &error_event())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::RetriesExhausted { attempts: 2, last_status: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_client_is_provider_agnostic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/json"))
            .and(header("x-custom-auth", "Bearer abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ResilientClient::new(
            &TransportConfig::default(),
            Arc::new(FixedDelay::new(Duration::from_millis(10))),
        )
        .unwrap();

        let report = client
            .send(
                &DeliveryContext::new(),
                Uuid::new_v4(),
                &server.uri(),
                Bytes::from_static(br#"{"hello":"world"}"#),
                |headers| {
                    headers.insert(
                        HeaderName::from_static("x-custom-auth"),
                        HeaderValue::from_static("Bearer abc"),
                    );
                },
            )
            .await
            .unwrap();

        assert_eq!(report.status, 204);
        assert_eq!(report.attempts, 1);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].body, br#"{"hello":"world"}"#);
    }
}
