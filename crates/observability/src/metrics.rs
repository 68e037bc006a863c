//! Exporter 自身指标
//!
//! 记录采集耗时、序列数量、元数据刷新等运行指标，并在内存中聚合摘要。

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一次采集
///
/// 每次 `SnapshotCollector::collect` 完成后调用。
pub fn record_collect(samples: usize, series: usize, duration: Duration) {
    counter!("firehose_exporter_collections_total").increment(1);
    histogram!("firehose_exporter_collect_duration_ms").record(duration.as_secs_f64() * 1000.0);
    gauge!("firehose_exporter_samples").set(samples as f64);
    gauge!("firehose_exporter_series").set(series as f64);
}

/// 记录 store 当前样本数
pub fn record_store_size(samples: usize) {
    gauge!("firehose_exporter_store_samples").set(samples as f64);
}

/// 记录过期清理
pub fn record_purged(purged: usize) {
    if purged > 0 {
        counter!("firehose_exporter_samples_expired_total").increment(purged as u64);
    }
}

/// 记录元数据刷新
pub fn record_metadata_refresh(success: bool, entries: usize) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "firehose_exporter_metadata_refreshes_total",
        "status" => status
    )
    .increment(1);
    if success {
        gauge!("firehose_exporter_metadata_entries").set(entries as f64);
    }
}

/// 采集指标聚合器
///
/// 在内存中聚合指标，便于退出时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ScrapeMetricsAggregator {
    /// 总采集次数
    pub total_collections: u64,

    /// 元数据刷新失败次数
    pub metadata_failures: u64,

    /// 过期清理的样本总数
    pub total_purged: u64,

    /// 采集耗时统计 (毫秒)
    pub duration_stats: RunningStats,

    /// 每次采集的样本数统计
    pub sample_stats: RunningStats,
}

impl ScrapeMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新采集统计
    pub fn update(&mut self, samples: usize, duration: Duration) {
        self.total_collections += 1;
        self.duration_stats.push(duration.as_secs_f64() * 1000.0);
        self.sample_stats.push(samples as f64);
    }

    pub fn record_metadata_failure(&mut self) {
        self.metadata_failures += 1;
    }

    pub fn record_purged(&mut self, purged: usize) {
        self.total_purged += purged as u64;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> ScrapeSummary {
        ScrapeSummary {
            total_collections: self.total_collections,
            metadata_failures: self.metadata_failures,
            total_purged: self.total_purged,
            collect_duration_ms: StatsSummary::from(&self.duration_stats),
            samples_per_collection: StatsSummary::from(&self.sample_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct ScrapeSummary {
    pub total_collections: u64,
    pub metadata_failures: u64,
    pub total_purged: u64,
    pub collect_duration_ms: StatsSummary,
    pub samples_per_collection: StatsSummary,
}

impl std::fmt::Display for ScrapeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Exporter Summary ===")?;
        writeln!(f, "Collections: {}", self.total_collections)?;
        writeln!(f, "Collect duration (ms): {}", self.collect_duration_ms)?;
        writeln!(f, "Samples per collection: {}", self.samples_per_collection)?;
        writeln!(f, "Expired samples purged: {}", self.total_purged)?;
        writeln!(f, "Metadata refresh failures: {}", self.metadata_failures)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
