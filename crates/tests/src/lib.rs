//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（scripted mock transport，无需 Doppler）
//! - 本地 websocket 服务端测试
//! - 并发一致性测试

#[cfg(test)]
mod support {
    use std::time::Duration;

    use contracts::{ContainerMetric, Envelope, MetricFamily};

    pub fn container(app: &str, index: i32, cpu: f64) -> Envelope {
        Envelope::container_metric(
            "rep",
            "10.0.0.1",
            ContainerMetric {
                application_id: app.to_string(),
                instance_index: index,
                cpu_percentage: cpu,
                memory_bytes: 1000,
                disk_bytes: 2000,
                memory_bytes_quota: 4000,
                disk_bytes_quota: 8000,
            },
        )
    }

    /// Poll `condition` until it holds; panics after five seconds.
    pub async fn wait_for(mut condition: impl FnMut() -> bool) {
        let polled = tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(polled.is_ok(), "condition not reached in time");
    }

    pub fn labels(family: &MetricFamily, series: usize) -> Vec<(String, String)> {
        family
            .labels(&family.series[series])
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_minimal_config_defaults() {
        let content = r#"
[firehose]
url = "wss://doppler.example.com:443"
subscription_id = "prometheus"
"#;
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.version, contracts::ConfigVersion::V1);
        assert_eq!(blueprint.metrics.namespace, "firehose");
        assert_eq!(blueprint.metrics.expiration(), None);
        assert_eq!(blueprint.exporter.listen_port, 9186);
        assert!(blueprint.metadata.is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use collector::{MemorySink, SnapshotCollector};
    use contracts::{
        CloseEvent, Envelope, InstanceId, MetadataEntry, MetricsConfig, StreamError,
    };
    use ingestion::{MockTransport, StreamIngestor};
    use metrics_store::{MetadataTable, MetricsStore};

    use crate::support::{container, labels, wait_for};

    fn metrics_config() -> MetricsConfig {
        MetricsConfig {
            environment: "test".into(),
            ..Default::default()
        }
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    /// End-to-end: scripted transport -> StreamIngestor -> MetricsStore ->
    /// SnapshotCollector -> MemorySink
    #[tokio::test]
    async fn test_e2e_container_metric_to_families() {
        let store = Arc::new(MetricsStore::new());
        let metadata = Arc::new(MetadataTable::from_entries(HashMap::from([(
            InstanceId::from("app-1"),
            MetadataEntry::new("svc", "space1", "org1"),
        )])));
        let (transport, handle) = MockTransport::scripted();
        let mut ingestor =
            StreamIngestor::new(transport, "prometheus", Arc::clone(&store), Arc::clone(&metadata));

        let driver = async {
            assert!(handle.send(container("app-1", 0, 42.0)).await);
            wait_for(|| store.len() == 1).await;
        };
        tokio::select! {
            result = ingestor.run() => panic!("ingestor stopped: {result:?}"),
            _ = driver => {}
        }

        let collector = SnapshotCollector::new(store, metadata, &metrics_config());
        let mut sink = MemorySink::new();
        let stats = collector.collect(&mut sink);
        assert_eq!(stats.samples, 1);

        let expected = [
            ("cpu_percentage", 42.0),
            ("memory_bytes", 1000.0),
            ("disk_bytes", 2000.0),
            ("memory_bytes_quota", 4000.0),
            ("disk_bytes_quota", 8000.0),
        ];
        for (suffix, value) in expected {
            let name = format!("firehose_container_metric_{suffix}");
            let family = sink.family(&name).unwrap();
            assert_eq!(family.series.len(), 1, "{name}");
            assert_eq!(family.series[0].value, value, "{name}");
            assert_eq!(
                labels(family, 0),
                vec![
                    pair("environment", "test"),
                    pair("bosh_job_ip", "10.0.0.1"),
                    pair("application_id", "app-1"),
                    pair("instance_index", "0"),
                    pair("app_name", "svc"),
                    pair("space", "space1"),
                    pair("org", "org1"),
                ]
            );
        }

        let received = sink.series("firehose_firehose_container_metrics_received_total");
        assert_eq!(received[0].value, 1.0);
    }

    /// Newer samples replace older ones; other envelope types only count.
    #[tokio::test]
    async fn test_latest_sample_wins() {
        let store = Arc::new(MetricsStore::new());
        let metadata = Arc::new(MetadataTable::new());
        let (transport, handle) = MockTransport::scripted();
        let mut ingestor =
            StreamIngestor::new(transport, "prometheus", Arc::clone(&store), Arc::clone(&metadata));

        let driver = async {
            assert!(handle.send(container("app-1", 0, 10.0)).await);
            assert!(handle.send(container("app-1", 1, 20.0)).await);
            assert!(handle.send(Envelope::counter_event("gorouter", "requests", 5)).await);
            assert!(handle.send(container("app-1", 0, 30.0)).await);
            wait_for(|| {
                store.read_counter(metrics_store::OperationalCounter::EnvelopesReceived) == 4
            })
            .await;
        };
        tokio::select! {
            result = ingestor.run() => panic!("ingestor stopped: {result:?}"),
            _ = driver => {}
        }

        let collector = SnapshotCollector::new(store, metadata, &metrics_config());
        let mut sink = MemorySink::new();
        collector.collect(&mut sink);

        let cpu = sink.series("firehose_container_metric_cpu_percentage");
        let values: Vec<f64> = cpu.iter().map(|s| s.value).collect();
        assert_eq!(values, [30.0, 20.0]);
        assert_eq!(
            sink.series("firehose_firehose_counter_events_received_total")[0].value,
            1.0
        );
    }

    /// Upstream drop notices and policy-violation closes raise the slow
    /// consumer counter without stopping ingestion.
    #[tokio::test]
    async fn test_slow_consumer_signals() {
        let store = Arc::new(MetricsStore::new());
        let metadata = Arc::new(MetadataTable::new());
        let (transport, handle) = MockTransport::scripted();
        let mut ingestor =
            StreamIngestor::new(transport, "prometheus", Arc::clone(&store), Arc::clone(&metadata));

        let alerts = || store.read_counter(metrics_store::OperationalCounter::SlowConsumerAlert);
        let driver = async {
            assert!(handle
                .send(Envelope::counter_event(
                    contracts::BROKER_ORIGIN,
                    contracts::DROPPED_MESSAGES_EVENT,
                    12
                ))
                .await);
            wait_for(|| alerts() == 1).await;

            let close = CloseEvent::new(CloseEvent::POLICY_VIOLATION, "slow consumer");
            assert!(handle.fail(StreamError::closed(close)).await);
            wait_for(|| alerts() == 2).await;

            assert!(handle.send(container("app-1", 0, 1.0)).await);
            wait_for(|| store.len() == 1).await;
        };
        tokio::select! {
            result = ingestor.run() => panic!("ingestor stopped: {result:?}"),
            _ = driver => {}
        }

        let collector = SnapshotCollector::new(store, metadata, &metrics_config());
        let mut sink = MemorySink::new();
        collector.collect(&mut sink);
        assert_eq!(
            sink.series("firehose_firehose_slow_consumer_alert_total")[0].value,
            2.0
        );
    }

    /// An instance that stops reporting disappears from the next scrape.
    #[tokio::test]
    async fn test_expired_instances_leave_exposition() {
        let store = Arc::new(MetricsStore::with_expiration(Some(Duration::from_millis(200))));
        let metadata = Arc::new(MetadataTable::new());
        let collector =
            SnapshotCollector::new(Arc::clone(&store), Arc::clone(&metadata), &metrics_config());
        let (transport, handle) = MockTransport::scripted();
        let mut ingestor =
            StreamIngestor::new(transport, "prometheus", Arc::clone(&store), Arc::clone(&metadata));

        let mut first = MemorySink::new();
        let mut second = MemorySink::new();
        let driver = async {
            assert!(handle.send(container("A", 0, 1.0)).await);
            assert!(handle.send(container("B", 0, 2.0)).await);
            wait_for(|| store.len() == 2).await;
            collector.collect(&mut first);

            tokio::time::sleep(Duration::from_millis(300)).await;
            store.purge_expired();
            assert!(handle.send(container("B", 0, 3.0)).await);
            assert!(handle.send(container("C", 0, 4.0)).await);
            wait_for(|| store.len() == 2).await;
            collector.collect(&mut second);
        };
        tokio::select! {
            result = ingestor.run() => panic!("ingestor stopped: {result:?}"),
            _ = driver => {}
        }

        let name = "firehose_container_metric_memory_bytes";
        assert_eq!(first.instances(name), ["A", "B"]);
        assert_eq!(second.instances(name), ["B", "C"]);
    }

    /// A fatal error ends `run` and closes the transport exactly once.
    #[tokio::test]
    async fn test_fatal_error_terminates() {
        let store = Arc::new(MetricsStore::new());
        let metadata = Arc::new(MetadataTable::new());
        let (transport, handle) = MockTransport::scripted();
        let mut ingestor = StreamIngestor::new(transport, "prometheus", store, metadata);

        assert!(handle.fail(StreamError::retryable("blip")).await);
        assert!(handle.fail(StreamError::fatal("bad token")).await);

        let result = tokio::time::timeout(Duration::from_secs(5), ingestor.run())
            .await
            .unwrap();
        assert!(matches!(
            result,
            Err(ingestion::IngestionError::Stream(StreamError::Fatal { .. }))
        ));
        assert_eq!(handle.close_count(), 1);
        assert_eq!(ingestor.state(), ingestion::IngestorState::Terminated);
    }
}

#[cfg(test)]
mod websocket_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{CloseEvent, StreamError};
    use firehose_client::{
        ConsumerConfig, EventType, FirehoseConsumer, RetryPolicy, WireContainerMetric,
        WireEnvelope,
    };
    use futures_util::SinkExt;
    use ingestion::StreamIngestor;
    use metrics_store::{MetadataTable, MetricsStore, OperationalCounter};
    use prost::Message as _;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;

    use crate::support::wait_for;

    fn frame(app: &str, index: i32) -> Vec<u8> {
        WireEnvelope {
            origin: "rep".into(),
            event_type: EventType::ContainerMetric as i32,
            timestamp: Some(1),
            counter_event: None,
            container_metric: Some(WireContainerMetric {
                application_id: app.into(),
                instance_index: index,
                cpu_percentage: 12.5,
                memory_bytes: 100,
                disk_bytes: 200,
                memory_bytes_quota: Some(400),
                disk_bytes_quota: Some(800),
            }),
            deployment: Some("cf".into()),
            job: Some("diego-cell".into()),
            index: Some("0".into()),
            ip: Some("10.0.0.7".into()),
        }
        .encode_to_vec()
    }

    fn consumer(port: u16) -> FirehoseConsumer {
        FirehoseConsumer::new(ConsumerConfig {
            url: format!("ws://127.0.0.1:{port}"),
            skip_tls_verify: false,
            idle_timeout: None,
            retry: RetryPolicy {
                min_delay: Duration::from_millis(50),
                max_delay: Duration::from_millis(100),
                max_retries: 3,
            },
            auth_token: Some("bearer test-token".into()),
            channel_capacity: 16,
        })
    }

    /// One Doppler session: records the handshake, sends two container
    /// metrics and closes with a policy violation.
    #[tokio::test]
    async fn test_consumer_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (handshake_tx, handshake_rx) = oneshot::channel::<(String, Option<String>)>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback =
                move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let auth = request
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let _ = handshake_tx.send((request.uri().to_string(), auth));
                    Ok(response)
                };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            ws.send(Message::Binary(frame("app-1", 0))).await.unwrap();
            ws.send(Message::Binary(frame("app-1", 1))).await.unwrap();
            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Policy,
                reason: "slow consumer".into(),
            })))
            .await
            .unwrap();
            // Hold the listener open; the client reconnect lands in the backlog.
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let store = Arc::new(MetricsStore::new());
        let metadata = Arc::new(MetadataTable::new());
        let mut ingestor = StreamIngestor::new(
            consumer(port),
            "prometheus",
            Arc::clone(&store),
            Arc::clone(&metadata),
        );

        let driver = async {
            wait_for(|| {
                store.len() == 2
                    && store.read_counter(OperationalCounter::SlowConsumerAlert) == 1
            })
            .await;
        };
        tokio::select! {
            result = ingestor.run() => panic!("ingestor stopped: {result:?}"),
            _ = driver => {}
        }
        ingestor.shutdown().await;

        let (path, auth) = handshake_rx.await.unwrap();
        assert_eq!(path, "/firehose/prometheus?filter-type=metrics");
        assert_eq!(auth.as_deref(), Some("bearer test-token"));

        let sample = store
            .snapshot()
            .into_iter()
            .find(|s| s.instance_index == 1)
            .unwrap();
        assert_eq!(sample.source, "10.0.0.7");
        assert_eq!(sample.memory_bytes_quota, 400);
        server.abort();
    }

    /// A refused handshake is reported as fatal and ends ingestion.
    #[tokio::test]
    async fn test_unauthorized_handshake_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
                let mut rejection = ErrorResponse::new(Some("unauthorized".to_string()));
                *rejection.status_mut() =
                    tokio_tungstenite::tungstenite::http::StatusCode::UNAUTHORIZED;
                Err(rejection)
            };
            let _ = tokio_tungstenite::accept_hdr_async(stream, callback).await;
        });

        let mut ingestor = StreamIngestor::new(
            consumer(port),
            "prometheus",
            Arc::new(MetricsStore::new()),
            Arc::new(MetadataTable::new()),
        );
        let result = tokio::time::timeout(Duration::from_secs(5), ingestor.run())
            .await
            .unwrap();

        match result {
            Err(ingestion::IngestionError::Stream(StreamError::Fatal { message })) => {
                assert!(message.contains("401"), "{message}");
            }
            other => panic!("expected fatal stream error, got {other:?}"),
        }
        let _ = server.await;
    }

    #[test]
    fn test_policy_violation_code() {
        assert_eq!(u16::from(CloseCode::Policy), CloseEvent::POLICY_VIOLATION);
    }
}

#[cfg(test)]
mod exposition_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use collector::SnapshotCollector;
    use contracts::{InstanceId, MetadataEntry, MetricSink, MetricsConfig};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use metrics_store::{MetadataTable, MetricsStore, OperationalCounter};
    use observability::{render_scrape, RecorderSink};

    use crate::support::container;

    /// Collector output rendered through the Prometheus recorder.
    #[test]
    fn test_prometheus_rendering() {
        let store = Arc::new(MetricsStore::new());
        store.record(container("app-1", 2, 42.0).to_sample().unwrap());
        store.increment_counter(OperationalCounter::EnvelopesReceived);
        let metadata = Arc::new(MetadataTable::from_entries(HashMap::from([(
            InstanceId::from("app-1"),
            MetadataEntry::new("svc", "space1", "org1"),
        )])));
        let collector = SnapshotCollector::new(
            store,
            metadata,
            &MetricsConfig {
                namespace: "cf".into(),
                environment: "prod".into(),
                ..Default::default()
            },
        );

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            let mut sink = RecorderSink::new();
            sink.describe(&collector.describe());
            collector.collect(&mut sink);
        });

        let rendered = handle.render();
        assert!(rendered.contains("# TYPE cf_container_metric_memory_bytes gauge"));
        let line = rendered
            .lines()
            .find(|l| l.starts_with("cf_container_metric_memory_bytes{"))
            .unwrap();
        for label in [
            r#"environment="prod""#,
            r#"bosh_job_ip="10.0.0.1""#,
            r#"application_id="app-1""#,
            r#"instance_index="2""#,
            r#"app_name="svc""#,
            r#"space="space1""#,
            r#"org="org1""#,
        ] {
            assert!(line.contains(label), "{label} missing from {line}");
        }
        let value: f64 = line.rsplit(' ').next().unwrap().parse().unwrap();
        assert_eq!(value, 1000.0);

        let envelopes = rendered
            .lines()
            .find(|l| l.starts_with("cf_firehose_envelopes_received_total"))
            .unwrap();
        assert!(envelopes.ends_with(" 1"));
    }

    /// Each scrape renders its own collection; departed instances are gone.
    #[test]
    fn test_departed_instance_leaves_exposition() {
        let store = Arc::new(MetricsStore::with_expiration(Some(Duration::from_millis(200))));
        let collector = SnapshotCollector::new(
            Arc::clone(&store),
            Arc::new(MetadataTable::new()),
            &MetricsConfig::default(),
        );
        let scrape = || {
            render_scrape(|sink| {
                sink.describe(&collector.describe());
                collector.collect(sink)
            })
        };

        store.record(container("A", 0, 1.0).to_sample().unwrap());
        store.record(container("B", 0, 2.0).to_sample().unwrap());
        let (first, stats) = scrape();
        assert_eq!(stats.samples, 2);
        assert!(first.contains(r#"application_id="A""#));

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(store.purge_expired(), 2);
        store.record(container("B", 0, 3.0).to_sample().unwrap());
        store.record(container("C", 0, 4.0).to_sample().unwrap());

        let (second, stats) = scrape();
        assert_eq!(stats.samples, 2);
        assert!(!second.contains(r#"application_id="A""#));
        assert!(second.contains(r#"application_id="B""#));
        assert!(second.contains(r#"application_id="C""#));
        let cpu_b = second
            .lines()
            .find(|l| {
                l.starts_with("firehose_container_metric_cpu_percentage{")
                    && l.contains(r#"application_id="B""#)
            })
            .unwrap();
        let value: f64 = cpu_b.rsplit(' ').next().unwrap().parse().unwrap();
        assert_eq!(value, 3.0);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use collector::{MemorySink, SnapshotCollector};
    use contracts::{InstanceId, MetadataEntry, MetricsConfig, Sample};
    use metrics_store::{MetadataTable, MetricsStore};
    use rand::Rng;

    const APPS: usize = 32;

    fn uniform_sample(app: usize, value: u64) -> Sample {
        Sample {
            source: "10.0.0.1".into(),
            instance_id: InstanceId::from(format!("app-{app}").as_str()),
            instance_index: 0,
            cpu_percentage: value as f64,
            memory_bytes: value,
            disk_bytes: value,
            memory_bytes_quota: value,
            disk_bytes_quota: value,
        }
    }

    fn generation(gen: u64) -> HashMap<InstanceId, MetadataEntry> {
        (0..APPS)
            .map(|app| {
                (
                    InstanceId::from(format!("app-{app}").as_str()),
                    MetadataEntry::new(format!("gen-{gen}"), "space", "org"),
                )
            })
            .collect()
    }

    /// Every sample is written with all five fields equal; a scrape must
    /// never observe a sample whose fields disagree.
    #[test]
    fn test_scrape_never_sees_torn_samples() {
        let store = Arc::new(MetricsStore::new());
        let metadata = Arc::new(MetadataTable::new());
        let collector =
            SnapshotCollector::new(Arc::clone(&store), metadata, &MetricsConfig::default());
        let stop = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut rng = rand::rng();
                    while !stop.load(Ordering::Relaxed) {
                        let app = rng.random_range(0..APPS);
                        let value = rng.random_range(0..1_000_000u64);
                        store.record(uniform_sample(app, value));
                    }
                })
            })
            .collect();

        let names = [
            "firehose_container_metric_cpu_percentage",
            "firehose_container_metric_memory_bytes",
            "firehose_container_metric_disk_bytes",
            "firehose_container_metric_memory_bytes_quota",
            "firehose_container_metric_disk_bytes_quota",
        ];
        for _ in 0..200 {
            let mut sink = MemorySink::new();
            collector.collect(&mut sink);

            let cpu = sink.series(names[0]);
            for name in &names[1..] {
                let other = sink.series(name);
                assert_eq!(cpu.len(), other.len());
                for (a, b) in cpu.iter().zip(other) {
                    assert_eq!(a.label_values, b.label_values);
                    assert_eq!(a.value, b.value, "torn sample in {name}");
                }
            }
        }

        stop.store(true, Ordering::Relaxed);
        for writer in writers {
            writer.join().unwrap();
        }
    }

    /// Metadata reloads swap the whole table; one scrape sees one generation.
    #[test]
    fn test_scrape_sees_single_metadata_generation() {
        let store = Arc::new(MetricsStore::new());
        for app in 0..APPS {
            store.record(uniform_sample(app, 1));
        }
        let metadata = Arc::new(MetadataTable::from_entries(generation(0)));
        let collector = SnapshotCollector::new(
            Arc::clone(&store),
            Arc::clone(&metadata),
            &MetricsConfig::default(),
        );
        let stop = Arc::new(AtomicBool::new(false));

        let refresher = {
            let metadata = Arc::clone(&metadata);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut gen = 1;
                while !stop.load(Ordering::Relaxed) {
                    metadata.replace(generation(gen));
                    gen += 1;
                }
            })
        };

        for _ in 0..200 {
            let mut sink = MemorySink::new();
            collector.collect(&mut sink);

            let family = sink
                .family("firehose_container_metric_memory_bytes")
                .unwrap();
            assert_eq!(family.series.len(), APPS);
            // app_name is the fourth variable label
            let first = &family.series[0].label_values[3];
            assert!(family
                .series
                .iter()
                .all(|s| &s.label_values[3] == first));
        }

        stop.store(true, Ordering::Relaxed);
        refresher.join().unwrap();
    }
}
