//! 融合样本
//!
//! 下游所有消费方（记录器、状态行、远程接口）共用的输出类型。
//! 发出后不可变，不含共享状态。

use serde::{Deserialize, Serialize};
use venado_protocol::{CanEntry, EnvRecord, GpsCanRecord};

/// 融合状态位图
pub const FUSED_GPS_FIX: u8 = 0x01;
pub const FUSED_GPS_CONN: u8 = 0x02;
pub const FUSED_CAN_ACTIVE: u8 = 0x04;
pub const FUSED_LIDAR_CONN: u8 = 0x08;
pub const FUSED_CO2_CONN: u8 = 0x10;

/// 两路设备字段的并集
///
/// 缺失一路时，该路字段取零值、连接标志为 false。时间戳取两路设备
/// 时间戳的较大者（只有一路时取该路）：设备时钟互不同步，用设备
/// 时间戳而非主机时刻保证相对设备时钟单调。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSample {
    /// max(两路设备时间戳)，毫秒
    pub timestamp_ms: u32,

    // --- 集线器 #1: GPS + CAN ---
    pub gps_fix: bool,
    pub gps_connected: bool,
    pub can_active: bool,
    pub latitude: f32,
    pub longitude: f32,
    pub speed_knots: f32,
    pub can_entries: Vec<CanEntry>,

    // --- 集线器 #2: Lidar + CO2 ---
    pub lidar_connected: bool,
    pub co2_connected: bool,
    pub distance_cm: u16,
    pub signal_strength: u16,
    pub co2_ppm: u16,
}

impl FusedSample {
    /// 由两路记录（任一可缺失）构造
    pub fn from_records(gps: Option<&GpsCanRecord>, env: Option<&EnvRecord>) -> Self {
        let timestamp_ms = match (gps, env) {
            (Some(g), Some(e)) => g.timestamp_ms.max(e.timestamp_ms),
            (Some(g), None) => g.timestamp_ms,
            (None, Some(e)) => e.timestamp_ms,
            (None, None) => 0,
        };
        Self {
            timestamp_ms,
            gps_fix: gps.is_some_and(|g| g.gps_fix),
            gps_connected: gps.is_some_and(|g| g.gps_connected),
            can_active: gps.is_some_and(|g| g.can_active),
            latitude: gps.map_or(0.0, |g| g.latitude),
            longitude: gps.map_or(0.0, |g| g.longitude),
            speed_knots: gps.map_or(0.0, |g| g.speed_knots),
            can_entries: gps.map_or_else(Vec::new, |g| g.can_entries.clone()),
            lidar_connected: env.is_some_and(|e| e.lidar_connected),
            co2_connected: env.is_some_and(|e| e.co2_connected),
            distance_cm: env.map_or(0, |e| e.distance_cm),
            signal_strength: env.map_or(0, |e| e.signal_strength),
            co2_ppm: env.map_or(0, |e| e.co2_ppm),
        }
    }

    /// 五个布尔标志合并的状态位图
    pub fn status_byte(&self) -> u8 {
        let mut status = 0u8;
        if self.gps_fix {
            status |= FUSED_GPS_FIX;
        }
        if self.gps_connected {
            status |= FUSED_GPS_CONN;
        }
        if self.can_active {
            status |= FUSED_CAN_ACTIVE;
        }
        if self.lidar_connected {
            status |= FUSED_LIDAR_CONN;
        }
        if self.co2_connected {
            status |= FUSED_CO2_CONN;
        }
        status
    }

    /// 速度换算：节 -> km/h
    pub fn speed_kmh(&self) -> f32 {
        self.speed_knots * 1.852
    }

    /// 速度换算：节 -> mph
    pub fn speed_mph(&self) -> f32 {
        self.speed_knots * 1.150_78
    }

    /// Lidar 距离换算：厘米 -> 米
    pub fn distance_m(&self) -> f32 {
        f32::from(self.distance_cm) / 100.0
    }

    /// 状态行用的紧凑摘要，如 `GPS:FIX CAN:ON LIDAR:OK CO2:OK`
    pub fn status_string(&self) -> String {
        let gps = if self.gps_fix {
            "FIX"
        } else if self.gps_connected {
            "NOFIX"
        } else {
            "DOWN"
        };
        format!(
            "GPS:{} CAN:{} LIDAR:{} CO2:{}",
            gps,
            if self.can_active { "ON" } else { "OFF" },
            if self.lidar_connected { "OK" } else { "DOWN" },
            if self.co2_connected { "OK" } else { "DOWN" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gps_record() -> GpsCanRecord {
        GpsCanRecord {
            timestamp_ms: 5000,
            gps_fix: true,
            gps_connected: true,
            can_active: false,
            latitude: 45.0,
            longitude: 9.0,
            speed_knots: 10.0,
            can_entries: vec![],
        }
    }

    fn env_record() -> EnvRecord {
        EnvRecord {
            timestamp_ms: 7000,
            lidar_connected: true,
            co2_connected: false,
            distance_cm: 250,
            signal_strength: 900,
            co2_ppm: 420,
        }
    }

    #[test]
    fn test_combined_takes_max_timestamp() {
        let sample = FusedSample::from_records(Some(&gps_record()), Some(&env_record()));
        assert_eq!(sample.timestamp_ms, 7000);
        assert_eq!(
            sample.status_byte(),
            FUSED_GPS_FIX | FUSED_GPS_CONN | FUSED_LIDAR_CONN
        );
    }

    #[test]
    fn test_partial_defaults_missing_side() {
        let sample = FusedSample::from_records(None, Some(&env_record()));
        assert_eq!(sample.timestamp_ms, 7000);
        assert!(!sample.gps_connected);
        assert_eq!(sample.latitude, 0.0);
        assert!(sample.can_entries.is_empty());
        assert_eq!(sample.distance_cm, 250);
    }

    #[test]
    fn test_unit_conversions() {
        let sample = FusedSample::from_records(Some(&gps_record()), Some(&env_record()));
        assert!((sample.speed_kmh() - 18.52).abs() < 1e-4);
        assert!((sample.speed_mph() - 11.5078).abs() < 1e-4);
        assert!((sample.distance_m() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_status_string() {
        let sample = FusedSample::from_records(Some(&gps_record()), Some(&env_record()));
        assert_eq!(sample.status_string(), "GPS:FIX CAN:OFF LIDAR:OK CO2:DOWN");
    }
}
