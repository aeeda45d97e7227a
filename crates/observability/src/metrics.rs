//! Sampler 指标收集模块
//!
//! 记录 Prometheus 指标, 并在内存中聚合运行摘要。

use metrics::{counter, gauge, histogram};

/// 记录已接收的 timeslice
pub fn record_timeslice_ingested(index: u64, size_bytes: u64) {
    counter!("ts_sampler_timeslices_total").increment(1);
    gauge!("ts_sampler_last_timeslice_index").set(index as f64);
    histogram!("ts_sampler_timeslice_size_bytes").record(size_bytes as f64);
}

/// 记录缺失的 timeslice 数量
pub fn record_missed_timeslices(count: u64) {
    if count > 0 {
        counter!("ts_sampler_missed_timeslices_total").increment(count);
    }
}

/// 记录缓冲区深度
pub fn record_buffer_depth(depth: usize) {
    gauge!("ts_sampler_buffer_depth").set(depth as f64);
}

/// 记录请求应答
pub fn record_reply(mode: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ts_sampler_replies_total",
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录发送的命令 (STOP / EOF)
pub fn record_command(command: &str) {
    counter!(
        "ts_sampler_commands_total",
        "command" => command.to_string()
    )
    .increment(1);
}

/// 记录直方图发布
pub fn record_publish(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("ts_sampler_publishes_total", "status" => status.to_string()).increment(1);
}

/// 运行指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SamplerMetricsAggregator {
    /// 接收的 timeslice 总数
    pub total_timeslices: u64,

    /// 缺失的 timeslice 总数
    pub total_missed: u64,

    /// 成功应答数
    pub replies_sent: u64,

    /// 失败应答数
    pub replies_failed: u64,

    /// 被忽略的请求数
    pub requests_ignored: u64,

    /// timeslice 大小统计 (MB)
    pub size_stats: RunningStats,
}

impl SamplerMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_timeslice(&mut self, size_bytes: u64, missed: u64) {
        self.total_timeslices += 1;
        self.total_missed += missed;
        self.size_stats.push(size_bytes as f64 / (1024.0 * 1024.0));
    }

    pub fn record_reply(&mut self, success: bool) {
        if success {
            self.replies_sent += 1;
        } else {
            self.replies_failed += 1;
        }
    }

    pub fn record_ignored(&mut self) {
        self.requests_ignored += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let seen = self.total_timeslices + self.total_missed;
        MetricsSummary {
            total_timeslices: self.total_timeslices,
            total_missed: self.total_missed,
            replies_sent: self.replies_sent,
            replies_failed: self.replies_failed,
            requests_ignored: self.requests_ignored,
            missed_rate: if seen > 0 {
                self.total_missed as f64 / seen as f64 * 100.0
            } else {
                0.0
            },
            size_mb: StatsSummary::from(&self.size_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_timeslices: u64,
    pub total_missed: u64,
    pub replies_sent: u64,
    pub replies_failed: u64,
    pub requests_ignored: u64,
    pub missed_rate: f64,
    pub size_mb: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sampler Metrics Summary ===")?;
        writeln!(f, "Timeslices ingested: {}", self.total_timeslices)?;
        writeln!(
            f,
            "Missed timeslices: {} ({:.2}%)",
            self.total_missed, self.missed_rate
        )?;
        writeln!(
            f,
            "Replies: {} sent, {} failed, {} requests ignored",
            self.replies_sent, self.replies_failed, self.requests_ignored
        )?;
        writeln!(f, "Timeslice size (MB): {}", self.size_mb)?;
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
        let (min, max) = stats.range.unwrap_or_default();
        Self {
            count: stats.count,
            min,
            max,
            mean: stats.mean,
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "mean {:.3} ± {:.3}, range [{:.3}, {:.3}], n={}",
            self.mean, self.std_dev, self.min, self.max, self.count
        )
    }
}

/// Welford 在线均值 / 方差
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    range: Option<(f64, f64)>,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.range = Some(match self.range {
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
            None => (value, value),
        });
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值，无样本时为 0
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 样本方差 (n - 1)
    pub fn variance(&self) -> f64 {
        match self.count {
            0 | 1 => 0.0,
            n => self.m2 / (n - 1) as f64,
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> Option<f64> {
        self.range.map(|(lo, _)| lo)
    }

    pub fn max(&self) -> Option<f64> {
        self.range.map(|(_, hi)| hi)
    }
}
