//! 驱动实时指标
//!
//! 零开销原子计数器，读取线程与融合线程更新，任意线程可随时
//! 读取快照，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 成功解码的帧数（两路合计）
    pub frames_decoded: AtomicU64,
    /// 解码失败的帧数（坏校验和/坏帧尾等，静默丢弃）
    pub decode_failures: AtomicU64,
    /// 重同步期间丢弃的帧头外字节数
    pub resync_bytes: AtomicU64,
    /// 声明长度越界的帧数
    pub bad_lengths: AtomicU64,
    /// 串口连接建立次数（含首连）
    pub connects: AtomicU64,
    /// 发出的融合样本数（含部分样本）
    pub samples_emitted: AtomicU64,
    /// 其中的部分样本数（只有一路数据）
    pub partial_samples: AtomicU64,
    /// 同步窗错过次数（两路都新鲜但相差过大，推迟合并）
    pub sync_window_misses: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取一致性较弱但无锁的快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            resync_bytes: self.resync_bytes.load(Ordering::Relaxed),
            bad_lengths: self.bad_lengths.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            samples_emitted: self.samples_emitted.load(Ordering::Relaxed),
            partial_samples: self.partial_samples.load(Ordering::Relaxed),
            sync_window_misses: self.sync_window_misses.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub resync_bytes: u64,
    pub bad_lengths: u64,
    pub connects: u64,
    pub samples_emitted: u64,
    pub partial_samples: u64,
    pub sync_window_misses: u64,
}

impl MetricsSnapshot {
    /// 解码成功率（百分比），无帧时返回 0.0
    pub fn decode_success_rate(&self) -> f64 {
        let total = self.frames_decoded + self.decode_failures;
        if total == 0 {
            return 0.0;
        }
        (self.frames_decoded as f64 / total as f64) * 100.0
    }
}
