//! FirehoseConsumer - websocket transport
//!
//! One background task owns the socket. It forwards decoded envelopes,
//! reports every disconnect as a retryable error, reconnects with backoff
//! and gives up with a fatal error on auth rejection or retry exhaustion.

use std::time::Duration;

use async_channel::Sender;
use contracts::{
    CloseEvent, ContractError, Envelope, FirehoseConfig, FirehoseTransport, StreamChannels,
    StreamError,
};
use futures_util::StreamExt;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, Request};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::Connector;
use tracing::{debug, error, info, instrument, warn};

use crate::backoff::RetryPolicy;
use crate::error::TransportError;
use crate::wire::decode_envelope;

const TRANSPORT_NAME: &str = "firehose-websocket";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`FirehoseConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base traffic controller URL (`ws://` or `wss://`)
    pub url: String,
    pub skip_tls_verify: bool,
    pub idle_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    /// Value of the `Authorization` header
    pub auth_token: Option<String>,
    pub channel_capacity: usize,
}

impl ConsumerConfig {
    pub fn from_config(config: &FirehoseConfig) -> Self {
        Self {
            url: config.url.clone(),
            skip_tls_verify: config.skip_tls_verify,
            idle_timeout: config.idle_timeout(),
            retry: RetryPolicy::from_config(config),
            auth_token: config.auth_token.clone(),
            channel_capacity: 1024,
        }
    }

    /// Full stream URL for a subscription.
    pub fn stream_url(&self, subscription_id: &str) -> String {
        format!(
            "{}/firehose/{}?filter-type=metrics",
            self.url.trim_end_matches('/'),
            subscription_id
        )
    }

    fn request(&self, subscription_id: &str) -> Result<Request<()>, TransportError> {
        let url = self.stream_url(subscription_id);
        let mut request =
            url.clone()
                .into_client_request()
                .map_err(|e| TransportError::InvalidUrl {
                    url,
                    message: e.to_string(),
                })?;

        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(token).map_err(|_| TransportError::InvalidToken)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }

    fn connector(&self) -> Result<Option<Connector>, TransportError> {
        if !self.skip_tls_verify {
            return Ok(None);
        }
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        Ok(Some(Connector::NativeTls(tls)))
    }
}

/// Websocket firehose transport.
pub struct FirehoseConsumer {
    config: ConsumerConfig,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl FirehoseConsumer {
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            config,
            shutdown: None,
            task: None,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }
}

impl FirehoseTransport for FirehoseConsumer {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    async fn subscribe(&mut self, subscription_id: &str) -> Result<StreamChannels, ContractError> {
        if self.task.is_some() {
            return Err(TransportError::AlreadySubscribed.into());
        }

        // Validate everything that cannot change between reconnects up front.
        let request = self.config.request(subscription_id)?;
        let connector = self.config.connector()?;

        let (msg_tx, msg_rx) = async_channel::bounded(self.config.channel_capacity.max(1));
        let (err_tx, err_rx) = async_channel::bounded(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let connection = Connection {
            url: request.uri().to_string(),
            config: self.config.clone(),
            subscription_id: subscription_id.to_string(),
            connector,
            messages: msg_tx,
            errors: err_tx,
        };
        self.task = Some(tokio::spawn(connection.run(shutdown_rx)));
        self.shutdown = Some(shutdown_tx);

        info!(url = %self.config.stream_url(subscription_id), "Firehose subscription started");
        Ok(StreamChannels {
            messages: msg_rx,
            errors: err_rx,
        })
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
                Ok(Err(e)) if !e.is_cancelled() => {
                    return Err(ContractError::close(TRANSPORT_NAME, e.to_string()));
                }
                Ok(_) => debug!("Firehose connection task stopped"),
                Err(_) => {
                    warn!("Firehose connection task did not stop in time, aborting");
                    task.abort();
                }
            }
        }
        Ok(())
    }
}

/// How one websocket session ended.
enum SessionEnd {
    /// Disconnect worth reconnecting after
    Retry {
        error: StreamError,
        connected: bool,
    },
    Fatal(StreamError),
    /// Nobody is reading the message channel anymore
    ReceiverGone,
}

struct Connection {
    url: String,
    config: ConsumerConfig,
    subscription_id: String,
    connector: Option<Connector>,
    messages: Sender<Envelope>,
    errors: Sender<StreamError>,
}

impl Connection {
    #[instrument(name = "firehose_connection", skip_all, fields(url = %self.url))]
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let retry = self.config.retry;
        let mut attempts: u32 = 0;

        loop {
            let end = tokio::select! {
                _ = shutdown.changed() => break,
                end = self.session() => end,
            };

            match end {
                SessionEnd::ReceiverGone => break,
                SessionEnd::Fatal(e) => {
                    error!(error = %e, "Firehose connection failed permanently");
                    let _ = self.errors.send(e).await;
                    break;
                }
                SessionEnd::Retry { error, connected } => {
                    if connected {
                        attempts = 0;
                    }
                    warn!(error = %error, attempts, "Firehose disconnected");
                    if self.errors.send(error).await.is_err() {
                        break;
                    }

                    attempts += 1;
                    if retry.exhausted(attempts) {
                        let e = StreamError::fatal(format!(
                            "giving up after {} reconnect attempts",
                            retry.max_retries
                        ));
                        let _ = self.errors.send(e).await;
                        break;
                    }

                    let delay = retry.delay(attempts - 1);
                    debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    counter!("firehose_exporter_reconnects_total").increment(1);
                }
            }
        }
        debug!("Firehose connection loop exited");
    }

    async fn session(&self) -> SessionEnd {
        let request = match self.config.request(&self.subscription_id) {
            Ok(request) => request,
            Err(e) => return SessionEnd::Fatal(StreamError::fatal(e.to_string())),
        };
        let connected = tokio_tungstenite::connect_async_tls_with_config(
            request,
            None,
            false,
            self.connector.clone(),
        )
        .await;

        let mut stream = match connected {
            Ok((stream, _response)) => stream,
            Err(e) => return classify_connect_error(e),
        };
        info!("Connected to firehose");

        loop {
            let next = match self.config.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        return SessionEnd::Retry {
                            error: StreamError::retryable(format!(
                                "no data received for {}s",
                                limit.as_secs()
                            )),
                            connected: true,
                        }
                    }
                },
                None => stream.next().await,
            };

            match next {
                Some(Ok(Message::Binary(frame))) => match decode_envelope(&frame[..]) {
                    Ok(envelope) => {
                        if self.messages.send(envelope).await.is_err() {
                            return SessionEnd::ReceiverGone;
                        }
                    }
                    Err(e) => warn!(error = %e, "Skipping undecodable frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let error = match frame {
                        Some(frame) => StreamError::closed(CloseEvent::new(
                            u16::from(frame.code),
                            frame.reason.to_string(),
                        )),
                        None => StreamError::retryable("connection closed without close frame"),
                    };
                    return SessionEnd::Retry {
                        error,
                        connected: true,
                    };
                }
                // Ping/pong is answered by tungstenite; text frames are not envelopes.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return SessionEnd::Retry {
                        error: StreamError::retryable(e.to_string()),
                        connected: true,
                    }
                }
                None => {
                    return SessionEnd::Retry {
                        error: StreamError::retryable("stream ended"),
                        connected: true,
                    }
                }
            }
        }
    }
}

fn classify_connect_error(error: WsError) -> SessionEnd {
    match &error {
        WsError::Http(response) if is_auth_rejection(response.status().as_u16()) => {
            SessionEnd::Fatal(StreamError::fatal(format!(
                "firehose rejected the handshake: HTTP {}",
                response.status()
            )))
        }
        WsError::Url(e) => SessionEnd::Fatal(StreamError::fatal(format!("invalid url: {e}"))),
        _ => SessionEnd::Retry {
            error: StreamError::retryable(format!("connect failed: {error}")),
            connected: false,
        },
    }
}

fn is_auth_rejection(status: u16) -> bool {
    matches!(status, 401 | 403)
}
