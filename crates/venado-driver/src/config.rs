//! 驱动配置

use std::time::Duration;

/// 读取/融合时序参数
///
/// 默认值对应硬件实测的 1Hz 发帧节奏：同步窗取半个帧间隔，
/// 缓冲超时取两个帧间隔。
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// 两路记录到达时刻的最大允许差值，超过则暂不合并
    pub sync_window: Duration,
    /// 记录的最大新鲜期，超过视为该设备无数据
    pub buffer_timeout: Duration,
    /// 连接失败 / 断开后的重试间隔
    pub reconnect_backoff: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sync_window: Duration::from_millis(500),
            buffer_timeout: Duration::from_millis(2000),
            reconnect_backoff: Duration::from_millis(1000),
        }
    }
}
