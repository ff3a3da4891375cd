//! 总线指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 总线实时指标
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 请求-应答事务数（包括失败的）
    pub transactions: AtomicU64,
    /// 写出的帧数（含广播）
    pub tx_frames: AtomicU64,
    /// 收到的完整帧数（含被过滤的回显）
    pub rx_frames: AtomicU64,
    /// 被过滤掉的回显帧数（半双工转换器把发送的字节反射回来）
    pub rx_echo_filtered: AtomicU64,
    /// 其他 ID 的帧被丢弃的次数
    pub rx_foreign: AtomicU64,
    pub timeouts: AtomicU64,
    pub checksum_errors: AtomicU64,
    pub frame_errors: AtomicU64,
    /// 舵机在状态包中报告错误的次数
    pub status_errors: AtomicU64,
    pub cancelled: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 读取所有计数器的快照（`Relaxed`，计数器之间可能有微小时间差）
    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            transactions: self.transactions.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            rx_echo_filtered: self.rx_echo_filtered.load(Ordering::Relaxed),
            rx_foreign: self.rx_foreign.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            status_errors: self.status_errors.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.transactions,
            &self.tx_frames,
            &self.rx_frames,
            &self.rx_echo_filtered,
            &self.rx_foreign,
            &self.timeouts,
            &self.checksum_errors,
            &self.frame_errors,
            &self.status_errors,
            &self.cancelled,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusMetricsSnapshot {
    pub transactions: u64,
    pub tx_frames: u64,
    pub rx_frames: u64,
    pub rx_echo_filtered: u64,
    pub rx_foreign: u64,
    pub timeouts: u64,
    pub checksum_errors: u64,
    pub frame_errors: u64,
    pub status_errors: u64,
    pub cancelled: u64,
}

impl BusMetricsSnapshot {
    /// 超时事务占比（百分比，0.0 到 100.0）
    pub fn timeout_rate(&self) -> f64 {
        if self.transactions == 0 {
            return 0.0;
        }
        (self.timeouts as f64 / self.transactions as f64) * 100.0
    }

    /// 校验和或帧结构错误的事务占比（百分比）
    pub fn corruption_rate(&self) -> f64 {
        if self.transactions == 0 {
            return 0.0;
        }
        ((self.checksum_errors + self.frame_errors) as f64 / self.transactions as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = BusMetrics::new();
        metrics.transactions.fetch_add(4, Ordering::Relaxed);
        metrics.timeouts.fetch_add(1, Ordering::Relaxed);
        metrics.checksum_errors.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions, 4);
        assert_eq!(snapshot.timeout_rate(), 25.0);
        assert_eq!(snapshot.corruption_rate(), 25.0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), BusMetricsSnapshot::default());
        assert_eq!(metrics.snapshot().timeout_rate(), 0.0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(BusMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        BusMetrics::incr(&m.tx_frames);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().tx_frames, 800);
    }
}
