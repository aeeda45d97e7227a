//! Run statistics.

use std::time::Duration;

use contracts::SplitMode;
use dispatcher::ServeOutcome;
use observability::MetricsSummary;

/// Statistics from one serve run
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Why the serve loop returned
    pub outcome: ServeOutcome,

    pub mode: SplitMode,

    /// Total duration of the run
    pub duration: Duration,

    /// Replies sent, first-index replies included
    pub messages: u64,

    /// Timeslices read from the source
    pub timeslices: u64,

    pub first_index: Option<u64>,

    pub last_index: Option<u64>,

    /// Whether the source reported its end
    pub eof_found: bool,

    /// Buffer entries evicted to make room
    pub evicted: u64,

    /// Successful histogram publishes, `None` when monitoring is off
    pub publishes: Option<u64>,

    pub metrics: MetricsSummary,
}

impl RunStats {
    /// Replies per second
    pub fn reply_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    fn describe_outcome(&self) -> String {
        match &self.outcome {
            ServeOutcome::Stopped => "stopped after a failed send".to_string(),
            ServeOutcome::ChannelClosed => "request channel closed".to_string(),
            ServeOutcome::TransportError(e) => format!("request transport failed: {e}"),
            ServeOutcome::Interrupted => "interrupted by signal".to_string(),
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    TS Sampler Run Summary                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Outcome: {}", self.describe_outcome());
        println!("   ├─ Mode: {}", self.mode.as_str());
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages sent: {}", self.messages);
        println!("   └─ Replies/s: {:.2}", self.reply_rate());

        println!("\n📥 Input");
        println!("   ├─ Timeslices read: {}", self.timeslices);
        match (self.first_index, self.last_index) {
            (Some(first), Some(last)) => println!("   ├─ Index range: {first}..={last}"),
            _ => println!("   ├─ Index range: (none)"),
        }
        println!(
            "   ├─ Missed: {} ({:.2}%)",
            self.metrics.total_missed, self.metrics.missed_rate
        );
        println!("   ├─ Buffer evictions: {}", self.evicted);
        println!("   └─ End of stream: {}", if self.eof_found { "yes" } else { "no" });

        println!("\n📤 Requests");
        println!("   ├─ Replies sent: {}", self.metrics.replies_sent);
        println!("   ├─ Replies failed: {}", self.metrics.replies_failed);
        println!("   └─ Requests ignored: {}", self.metrics.requests_ignored);

        if let Some(publishes) = self.publishes {
            println!("\n📈 Monitoring");
            println!("   └─ Histogram publishes: {publishes}");
        }

        if self.metrics.size_mb.count > 0 {
            println!("\n📦 Timeslice size (MB)");
            println!("   └─ {}", self.metrics.size_mb);
        }

        println!();
    }
}
