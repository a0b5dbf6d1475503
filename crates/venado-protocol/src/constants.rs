//! 帧常量与状态位定义
//!
//! 数值来源于集线器固件 v2.0 协议，必须与固件逐字节一致。

/// 帧头（同步序列）
pub const FRAME_HEADER: [u8; 2] = [0xAA, 0x55];

/// 帧尾
pub const FRAME_FOOTER: [u8; 2] = [0x0D, 0x0A];

/// 任何合法帧的最小结构：头(2) + 长度(2) + 时间戳(4) + 状态(1) + 校验(1) + 尾(2)
pub const MIN_FRAME_LEN: usize = 12;

/// 变体 A（GPS+CAN）最小帧长：空 CAN 列表
pub const GPS_CAN_MIN_LEN: usize = 25;

/// 变体 A（GPS+CAN）最大帧长（约 113 条 CAN 报文）
pub const GPS_CAN_MAX_LEN: usize = 1500;

/// 变体 B（Lidar+CO2）定长帧长
pub const ENV_FRAME_LEN: usize = 18;

/// 单条 CAN 报文编码长度：id(4) + dlc(1) + data(8)
pub const CAN_ENTRY_LEN: usize = 13;

// === 帧内固定偏移（两个变体共用前缀） ===

/// 设备时间戳偏移（u32 LE，设备开机毫秒数）
pub const TIMESTAMP_OFFSET: usize = 4;

/// 状态位图偏移
pub const STATUS_OFFSET: usize = 8;

/// 负载起始偏移
pub const PAYLOAD_OFFSET: usize = 9;

// === 变体 A 状态位 ===

/// GPS 已定位
pub const STATUS_GPS_FIX: u8 = 0x01;
/// GPS 模块在线
pub const STATUS_GPS_CONN: u8 = 0x02;
/// CAN 总线有流量
pub const STATUS_CAN_ACTIVE: u8 = 0x04;

// === 变体 B 状态位 ===

/// Lidar 在线
pub const STATUS_LIDAR_CONN: u8 = 0x01;
/// CO2 传感器在线
pub const STATUS_CO2_CONN: u8 = 0x02;
