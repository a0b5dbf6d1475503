//! 设备记录缓冲
//!
//! 每台设备一个 [`DeviceBuffer`]，持有最近一条成功解码的记录和
//! 它的到达时刻。写入方是唯一的读取线程，读取方是融合线程；
//! record + 到达时刻必须作为整体原子替换，否则融合线程可能看到
//! 时刻与记录错配。这里用 `ArcSwapOption` 做整槽指针替换。

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use venado_protocol::DeviceRecord;

/// 缓冲槽：记录 + 到达时刻，不可变
#[derive(Debug, Clone)]
pub struct BufferSlot {
    pub record: DeviceRecord,
    pub received_at: Instant,
}

impl BufferSlot {
    /// 距 `now` 的年龄
    ///
    /// `received_at` 可能晚于调用方先取到的 `now`（写入并发发生在
    /// 取 now 之后），饱和到零而不是 panic。
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.received_at)
    }
}

/// 单设备缓冲（last-write-wins）
#[derive(Debug, Default)]
pub struct DeviceBuffer {
    slot: ArcSwapOption<BufferSlot>,
}

impl DeviceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一条新记录，到达时刻取当前时间
    pub fn store(&self, record: DeviceRecord) {
        self.store_at(record, Instant::now());
    }

    /// 指定到达时刻写入（测试构造场景用）
    pub fn store_at(&self, record: DeviceRecord, received_at: Instant) {
        self.slot.store(Some(Arc::new(BufferSlot {
            record,
            received_at,
        })));
    }

    /// 读取当前槽
    pub fn load(&self) -> Option<Arc<BufferSlot>> {
        self.slot.load_full()
    }

    /// 清空（断连时调用，立即让该设备在融合中消失）
    pub fn clear(&self) {
        self.slot.store(None);
    }
}
