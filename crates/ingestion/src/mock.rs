//! Mock firehose transport
//!
//! 用于无 firehose 环境的测试和本地运行。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_channel::{Receiver, Sender};
use contracts::{
    ContainerMetric, ContractError, Envelope, FirehoseTransport, StreamChannels, StreamError,
};
use tracing::{debug, trace};

/// Synthetic firehose 配置
#[derive(Debug, Clone)]
pub struct MockFirehoseConfig {
    /// 模拟应用数量
    pub apps: u32,

    /// 每个应用的实例数量
    pub instances_per_app: u32,

    /// 每秒发送轮数
    pub frequency_hz: f64,

    /// 通道容量
    pub channel_capacity: usize,

    /// 模拟 cell IP
    pub source_ip: String,
}

impl Default for MockFirehoseConfig {
    fn default() -> Self {
        Self {
            apps: 3,
            instances_per_app: 2,
            frequency_hz: 1.0,
            channel_capacity: 100,
            source_ip: "10.0.0.1".to_string(),
        }
    }
}

enum Mode {
    Scripted {
        messages: Option<Receiver<Envelope>>,
        errors: Option<Receiver<StreamError>>,
    },
    Synthetic(MockFirehoseConfig),
}

/// Mock transport
///
/// Scripted mode hands the stream to a [`MockHandle`]; synthetic mode
/// generates container metrics on a timer.
pub struct MockTransport {
    mode: Mode,
    running: Arc<AtomicBool>,
    close_count: Arc<AtomicUsize>,
}

/// Test-side end of a scripted [`MockTransport`].
pub struct MockHandle {
    messages: Sender<Envelope>,
    errors: Sender<StreamError>,
    close_count: Arc<AtomicUsize>,
}

impl MockHandle {
    /// Deliver an envelope. Returns false once the ingestor is gone.
    pub async fn send(&self, envelope: Envelope) -> bool {
        self.messages.send(envelope).await.is_ok()
    }

    /// Deliver a stream error.
    pub async fn fail(&self, error: StreamError) -> bool {
        self.errors.send(error).await.is_ok()
    }

    /// Shared count of `close()` calls.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

impl MockTransport {
    /// Transport driven by the returned handle.
    pub fn scripted() -> (Self, MockHandle) {
        let (msg_tx, msg_rx) = async_channel::unbounded();
        let (err_tx, err_rx) = async_channel::unbounded();
        let close_count = Arc::new(AtomicUsize::new(0));

        let transport = Self {
            mode: Mode::Scripted {
                messages: Some(msg_rx),
                errors: Some(err_rx),
            },
            running: Arc::new(AtomicBool::new(false)),
            close_count: Arc::clone(&close_count),
        };
        let handle = MockHandle {
            messages: msg_tx,
            errors: err_tx,
            close_count,
        };
        (transport, handle)
    }

    /// Transport that generates container metrics.
    pub fn synthetic(config: MockFirehoseConfig) -> Self {
        Self {
            mode: Mode::Synthetic(config),
            running: Arc::new(AtomicBool::new(false)),
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl FirehoseTransport for MockTransport {
    fn name(&self) -> &str {
        match self.mode {
            Mode::Scripted { .. } => "mock-scripted",
            Mode::Synthetic(_) => "mock-synthetic",
        }
    }

    async fn subscribe(&mut self, subscription_id: &str) -> Result<StreamChannels, ContractError> {
        match &mut self.mode {
            Mode::Scripted { messages, errors } => match (messages.take(), errors.take()) {
                (Some(messages), Some(errors)) => {
                    self.running.store(true, Ordering::SeqCst);
                    debug!(subscription_id, "Scripted mock subscribed");
                    Ok(StreamChannels { messages, errors })
                }
                _ => Err(ContractError::subscribe(
                    "mock-scripted",
                    "stream already handed out",
                )),
            },
            Mode::Synthetic(config) => {
                let (msg_tx, msg_rx) = async_channel::bounded(config.channel_capacity.max(1));
                // Synthetic streams never fail; the sender stays alive in the task.
                let (err_tx, err_rx) = async_channel::bounded(1);

                self.running.store(true, Ordering::SeqCst);
                tokio::spawn(generate(
                    config.clone(),
                    msg_tx,
                    err_tx,
                    Arc::clone(&self.running),
                ));
                debug!(subscription_id, apps = config.apps, "Synthetic mock subscribed");
                Ok(StreamChannels {
                    messages: msg_rx,
                    errors: err_rx,
                })
            }
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.running.store(false, Ordering::SeqCst);
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn generate(
    config: MockFirehoseConfig,
    messages: Sender<Envelope>,
    _errors: Sender<StreamError>,
    running: Arc<AtomicBool>,
) {
    let period = Duration::from_secs_f64(1.0 / config.frequency_hz.max(0.001));
    let mut ticker = tokio::time::interval(period);
    let mut round: u64 = 0;

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        for app in 0..config.apps {
            for index in 0..config.instances_per_app {
                let envelope = synthetic_envelope(&config, app, index, round);
                if messages.send(envelope).await.is_err() {
                    debug!("Synthetic mock receiver dropped");
                    return;
                }
            }
        }
        trace!(round, "Synthetic round sent");
        round += 1;
    }
    debug!(rounds = round, "Synthetic mock stopped");
}

fn synthetic_envelope(config: &MockFirehoseConfig, app: u32, index: u32, round: u64) -> Envelope {
    let phase = (round as f64 / 10.0 + app as f64 + index as f64 * 0.5).sin();
    let memory_quota = 512 * 1024 * 1024;
    let disk_quota = 1024 * 1024 * 1024;

    Envelope::container_metric(
        "rep",
        config.source_ip.clone(),
        ContainerMetric {
            application_id: format!("mock-app-{app}"),
            instance_index: index as i32,
            cpu_percentage: 50.0 + 40.0 * phase,
            memory_bytes: (memory_quota as f64 * (0.5 + 0.25 * phase)) as u64,
            disk_bytes: disk_quota / 4,
            memory_bytes_quota: memory_quota,
            disk_bytes_quota: disk_quota,
        },
    )
}
