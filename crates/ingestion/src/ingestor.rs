//! StreamIngestor - the firehose receive loop

use std::sync::Arc;

use async_channel::Receiver;
use contracts::{Envelope, Event, FirehoseTransport, StreamChannels, StreamError};
use metrics::counter;
use metrics_store::{MetadataTable, MetricsStore, OperationalCounter};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestionError, Result};

/// Connection state of the ingestor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestorState {
    Disconnected,
    Connected,
    Terminated,
}

/// What the loop does after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Terminate,
}

/// Consumes one firehose subscription and feeds the metrics store.
pub struct StreamIngestor<T> {
    transport: T,
    subscription_id: String,
    store: Arc<MetricsStore>,
    metadata: Arc<MetadataTable>,
    state: IngestorState,
    /// `close()` already issued; the transport is never closed twice
    closed: bool,
}

impl<T: FirehoseTransport> StreamIngestor<T> {
    pub fn new(
        transport: T,
        subscription_id: impl Into<String>,
        store: Arc<MetricsStore>,
        metadata: Arc<MetadataTable>,
    ) -> Self {
        Self {
            transport,
            subscription_id: subscription_id.into(),
            store,
            metadata,
            state: IngestorState::Disconnected,
            closed: false,
        }
    }

    pub fn state(&self) -> IngestorState {
        self.state
    }

    /// Subscribe and process the stream until a non-retryable error.
    ///
    /// Only returns on failure; the error is the reason the loop stopped.
    #[instrument(
        name = "stream_ingestor_run",
        skip(self),
        fields(transport = %self.transport.name(), subscription_id = %self.subscription_id)
    )]
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting firehose ingestion");

        let StreamChannels { messages, errors } =
            match self.transport.subscribe(&self.subscription_id).await {
                Ok(channels) => channels,
                Err(e) => {
                    self.state = IngestorState::Terminated;
                    return Err(IngestionError::Subscribe(e));
                }
            };
        self.state = IngestorState::Connected;
        info!("Subscribed to firehose");

        let result = self.receive(&messages, &errors).await;

        self.state = IngestorState::Terminated;
        info!("Firehose ingestion shutting down");
        result
    }

    /// Close the transport, e.g. on process shutdown.
    ///
    /// Does nothing if the loop already closed it on a fatal error.
    pub async fn shutdown(&mut self) {
        self.close_transport().await;
        self.state = IngestorState::Terminated;
    }

    async fn receive(
        &mut self,
        messages: &Receiver<Envelope>,
        errors: &Receiver<StreamError>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                received = messages.recv() => match received {
                    Ok(envelope) => self.accept(&envelope),
                    Err(_) => return self.channel_closed("messages", errors).await,
                },
                received = errors.recv() => match received {
                    Ok(stream_error) => {
                        if self.handle_error(&stream_error) == Disposition::Terminate {
                            self.close_transport().await;
                            return Err(IngestionError::Stream(stream_error));
                        }
                    }
                    Err(_) => return self.channel_closed("errors", errors).await,
                },
            }
        }
    }

    /// Process one accepted envelope.
    pub fn accept(&self, envelope: &Envelope) {
        self.handle_message(envelope);

        if let Some(sample) = envelope.to_sample() {
            // Pin the metadata table so a refresh cannot interleave with
            // the write.
            let _metadata = self.metadata.read();
            self.store.record(sample);
        }
    }

    fn handle_message(&self, envelope: &Envelope) {
        self.store
            .increment_counter(OperationalCounter::EnvelopesReceived);

        match &envelope.event {
            Event::ContainerMetric(_) => self
                .store
                .increment_counter(OperationalCounter::ContainerMetricsReceived),
            Event::CounterEvent(_) => self
                .store
                .increment_counter(OperationalCounter::CounterEventsReceived),
            Event::Other => {}
        }

        if envelope.is_upstream_drop_signal() {
            warn!(
                origin = %envelope.origin,
                "Intercepted an upstream message indicating that the exporter or the \
                 traffic controller is not keeping up. Please try scaling up the exporter."
            );
            self.store
                .increment_counter(OperationalCounter::SlowConsumerAlert);
        }
    }

    /// Log and classify a stream error.
    pub fn handle_error(&self, stream_error: &StreamError) -> Disposition {
        error!(error = %stream_error, "Error while reading from the firehose");

        match stream_error {
            StreamError::Retryable {
                cause: Some(close), ..
            } if close.is_policy_violation() => {
                error!(
                    code = close.code,
                    "Exporter couldn't keep up. Please try scaling up the exporter."
                );
                self.store
                    .increment_counter(OperationalCounter::SlowConsumerAlert);
                counter!("firehose_exporter_stream_errors_total", "class" => "retryable")
                    .increment(1);
                Disposition::Continue
            }
            StreamError::Retryable { .. } => {
                counter!("firehose_exporter_stream_errors_total", "class" => "retryable")
                    .increment(1);
                Disposition::Continue
            }
            StreamError::Fatal { .. } => {
                counter!("firehose_exporter_stream_errors_total", "class" => "fatal").increment(1);
                Disposition::Terminate
            }
        }
    }

    // A transport that drops its senders may still have queued an error
    // explaining why; that error wins over the generic "closed" result.
    async fn channel_closed(
        &mut self,
        channel: &'static str,
        errors: &Receiver<StreamError>,
    ) -> Result<()> {
        while let Ok(stream_error) = errors.try_recv() {
            if self.handle_error(&stream_error) == Disposition::Terminate {
                self.close_transport().await;
                return Err(IngestionError::Stream(stream_error));
            }
        }

        warn!(channel, "Transport closed its channel");
        self.close_transport().await;
        Err(IngestionError::TransportClosed { channel })
    }

    async fn close_transport(&mut self) {
        if self.closed {
            debug!("Transport already closed");
            return;
        }
        self.closed = true;

        info!("Closing connection with firehose");
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Failed to close transport");
        } else {
            debug!("Transport closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use contracts::{CloseEvent, ContainerMetric, BROKER_ORIGIN, DROPPED_MESSAGES_EVENT};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn setup() -> (
        StreamIngestor<MockTransport>,
        crate::mock::MockHandle,
        Arc<MetricsStore>,
    ) {
        let (transport, handle) = MockTransport::scripted();
        let store = Arc::new(MetricsStore::new());
        let ingestor = StreamIngestor::new(
            transport,
            "test-sub",
            Arc::clone(&store),
            Arc::new(MetadataTable::new()),
        );
        (ingestor, handle, store)
    }

    fn container(app: &str, index: i32) -> Envelope {
        Envelope::container_metric(
            "rep",
            "10.0.0.1",
            ContainerMetric {
                application_id: app.into(),
                instance_index: index,
                cpu_percentage: 42.0,
                memory_bytes: 1000,
                disk_bytes: 2000,
                memory_bytes_quota: 4000,
                disk_bytes_quota: 8000,
            },
        )
    }

    fn alerts(store: &MetricsStore) -> u64 {
        store.read_counter(OperationalCounter::SlowConsumerAlert)
    }

    #[test]
    fn test_retryable_without_close_continues() {
        let (ingestor, _handle, store) = setup();
        let disposition = ingestor.handle_error(&StreamError::retryable("connection reset"));
        assert_eq!(disposition, Disposition::Continue);
        assert_eq!(alerts(&store), 0);
    }

    #[test]
    fn test_retryable_normal_close_does_not_alert() {
        let (ingestor, _handle, store) = setup();
        let disposition = ingestor.handle_error(&StreamError::closed(CloseEvent::new(1000, "")));
        assert_eq!(disposition, Disposition::Continue);
        assert_eq!(alerts(&store), 0);
    }

    #[test]
    fn test_policy_violation_close_alerts_once() {
        let (ingestor, _handle, store) = setup();
        let error = StreamError::closed(CloseEvent::new(CloseEvent::POLICY_VIOLATION, "slow"));
        assert_eq!(ingestor.handle_error(&error), Disposition::Continue);
        assert_eq!(alerts(&store), 1);
    }

    #[test]
    fn test_fatal_terminates() {
        let (ingestor, _handle, _store) = setup();
        assert_eq!(
            ingestor.handle_error(&StreamError::fatal("unauthorized")),
            Disposition::Terminate
        );
    }

    #[test]
    fn test_drop_signal_scoped_to_broker() {
        let (ingestor, _handle, store) = setup();
        ingestor.accept(&Envelope::counter_event(BROKER_ORIGIN, DROPPED_MESSAGES_EVENT, 10));
        assert_eq!(alerts(&store), 1);

        ingestor.accept(&Envelope::counter_event("metron", DROPPED_MESSAGES_EVENT, 10));
        assert_eq!(alerts(&store), 1);
        assert_eq!(
            store.read_counter(OperationalCounter::CounterEventsReceived),
            2
        );
    }

    #[test]
    fn test_accept_records_samples_only_for_container_metrics() {
        let (ingestor, _handle, store) = setup();
        ingestor.accept(&container("app-1", 0));
        ingestor.accept(&container("app-1", 0));
        ingestor.accept(&Envelope::counter_event("rep", "some.counter", 1));

        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.read_counter(OperationalCounter::EnvelopesReceived), 3);
        assert_eq!(
            store.read_counter(OperationalCounter::ContainerMetricsReceived),
            2
        );
    }

    #[tokio::test]
    async fn test_run_continues_on_retryable_and_stops_on_fatal() {
        let (mut ingestor, handle, store) = setup();
        let close_count = handle.close_counter();

        let driver = tokio::spawn(async move {
            handle.send(container("app-1", 0)).await;
            handle
                .fail(StreamError::closed(CloseEvent::new(
                    CloseEvent::POLICY_VIOLATION,
                    "",
                )))
                .await;
            handle.send(container("app-2", 0)).await;
            // Give the loop time to drain before the fatal error.
            sleep(Duration::from_millis(50)).await;
            handle.fail(StreamError::fatal("gone")).await;
            handle
        });

        let result = timeout(Duration::from_secs(5), ingestor.run())
            .await
            .expect("ingestor did not terminate");
        let _handle = driver.await.unwrap();

        match result {
            Err(IngestionError::Stream(StreamError::Fatal { message })) => {
                assert_eq!(message, "gone")
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(ingestor.state(), IngestorState::Terminated);
        assert_eq!(close_count.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(alerts(&store), 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_run_reports_transport_closed() {
        let (mut ingestor, handle, _store) = setup();
        let close_count = handle.close_counter();
        drop(handle);

        let result = timeout(Duration::from_secs(5), ingestor.run())
            .await
            .expect("ingestor did not terminate");
        assert!(matches!(
            result,
            Err(IngestionError::TransportClosed { .. })
        ));
        assert_eq!(close_count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queued_fatal_error_wins_over_closed_channels() {
        let (mut ingestor, handle, _store) = setup();
        handle.fail(StreamError::fatal("retries exhausted")).await;
        drop(handle);

        let result = timeout(Duration::from_secs(5), ingestor.run())
            .await
            .expect("ingestor did not terminate");
        assert!(matches!(
            result,
            Err(IngestionError::Stream(StreamError::Fatal { .. }))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_after_fatal_does_not_close_again() {
        let (mut ingestor, handle, _store) = setup();
        handle.fail(StreamError::fatal("unauthorized")).await;

        let result = timeout(Duration::from_secs(5), ingestor.run())
            .await
            .expect("ingestor did not terminate");
        assert!(result.is_err());
        assert_eq!(handle.close_count(), 1);

        ingestor.shutdown().await;
        ingestor.shutdown().await;
        assert_eq!(handle.close_count(), 1);
        assert_eq!(ingestor.state(), IngestorState::Terminated);
    }

    #[tokio::test]
    async fn test_shutdown_closes_live_transport_once() {
        let (mut ingestor, handle, _store) = setup();
        ingestor.shutdown().await;
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn test_second_subscribe_fails() {
        let (mut ingestor, handle, _store) = setup();
        drop(handle);
        let _ = ingestor.run().await;

        let result = ingestor.run().await;
        assert!(matches!(result, Err(IngestionError::Subscribe(_))));
    }
}
