//! 解码后的记录类型
//!
//! 两种帧变体建模为 tagged enum（[`DeviceRecord`]），变体由读取端
//! 配置决定（哪个物理设备），不从线上字节嗅探。

use crate::constants::*;

/// 帧变体标签
///
/// 每台物理集线器固定发送一种变体，由配置指定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceVariant {
    /// 集线器 #1：GPS + CAN（变长帧）
    GpsCan,
    /// 集线器 #2：Lidar + CO2（定长 18 字节帧）
    Env,
}

/// 单条 CAN 总线报文（线上编码 13 字节）
///
/// `data` 固定 8 字节，`dlc` 之后的尾部字节在线上存在但无语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanEntry {
    /// 仲裁 ID（u32 LE）
    pub id: u32,
    /// 有效数据长度 (0-8)
    pub dlc: u8,
    /// 帧数据（固定 8 字节）
    pub data: [u8; 8],
}

impl CanEntry {
    /// 获取有效负载切片（只包含 `dlc` 个字节）
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.dlc.min(8))]
    }

    /// 负载的十六进制表示（空格分隔，大写），用于 CSV/终端显示
    pub fn payload_hex(&self) -> String {
        self.payload()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 变体 A 记录：GPS + CAN
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsCanRecord {
    /// 设备时间戳（设备开机毫秒数，非墙钟时间）
    pub timestamp_ms: u32,
    /// GPS 已定位
    pub gps_fix: bool,
    /// GPS 模块在线
    pub gps_connected: bool,
    /// CAN 总线有流量
    pub can_active: bool,
    /// 纬度（度）
    pub latitude: f32,
    /// 经度（度）
    pub longitude: f32,
    /// 速度（节）
    pub speed_knots: f32,
    /// CAN 报文列表（可能因帧截断而短于声明计数）
    pub can_entries: Vec<CanEntry>,
}

impl GpsCanRecord {
    /// 组装状态字节（编码时使用）
    pub fn status_byte(&self) -> u8 {
        let mut status = 0u8;
        if self.gps_fix {
            status |= STATUS_GPS_FIX;
        }
        if self.gps_connected {
            status |= STATUS_GPS_CONN;
        }
        if self.can_active {
            status |= STATUS_CAN_ACTIVE;
        }
        status
    }
}

/// 变体 B 记录：Lidar + CO2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvRecord {
    /// 设备时间戳（设备开机毫秒数，非墙钟时间）
    pub timestamp_ms: u32,
    /// Lidar 在线
    pub lidar_connected: bool,
    /// CO2 传感器在线
    pub co2_connected: bool,
    /// Lidar 距离（厘米）
    pub distance_cm: u16,
    /// Lidar 信号强度
    pub signal_strength: u16,
    /// CO2 浓度（ppm）
    pub co2_ppm: u16,
}

impl EnvRecord {
    /// 组装状态字节（编码时使用）
    pub fn status_byte(&self) -> u8 {
        let mut status = 0u8;
        if self.lidar_connected {
            status |= STATUS_LIDAR_CONN;
        }
        if self.co2_connected {
            status |= STATUS_CO2_CONN;
        }
        status
    }
}

/// 解码后的设备记录（tagged union）
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceRecord {
    GpsCan(GpsCanRecord),
    Env(EnvRecord),
}

impl DeviceRecord {
    /// 设备时间戳（毫秒）
    pub fn timestamp_ms(&self) -> u32 {
        match self {
            DeviceRecord::GpsCan(r) => r.timestamp_ms,
            DeviceRecord::Env(r) => r.timestamp_ms,
        }
    }

    /// 该记录所属的帧变体
    pub fn variant(&self) -> DeviceVariant {
        match self {
            DeviceRecord::GpsCan(_) => DeviceVariant::GpsCan,
            DeviceRecord::Env(_) => DeviceVariant::Env,
        }
    }
}
