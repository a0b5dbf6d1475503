//! 帧编码
//!
//! 从记录生成符合线上格式的完整帧。核心链路只做解码；编码供
//! mock 数据源、回路测试和固件联调工具使用。

use crate::constants::*;
use crate::decode::checksum;
use crate::record::{DeviceRecord, EnvRecord, GpsCanRecord};

/// 编码一条记录为完整帧（头到尾）
///
/// 产出的帧总能被 [`crate::decode`] 以相同变体成功解码；在单帧
/// CAN 容量内字段逐一还原（round-trip 属性见
/// `tests/decode_properties.rs`），超出容量的条目被截断。
pub fn encode(record: &DeviceRecord) -> Vec<u8> {
    match record {
        DeviceRecord::GpsCan(r) => encode_gps_can(r),
        DeviceRecord::Env(r) => encode_env(r),
    }
}

/// 帧长上限决定的单帧 CAN 条目容量
pub const MAX_CAN_ENTRIES: usize = (GPS_CAN_MAX_LEN - GPS_CAN_MIN_LEN) / CAN_ENTRY_LEN;

fn encode_gps_can(r: &GpsCanRecord) -> Vec<u8> {
    let entries = &r.can_entries[..r.can_entries.len().min(MAX_CAN_ENTRIES)];
    let total = GPS_CAN_MIN_LEN + entries.len() * CAN_ENTRY_LEN;
    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&FRAME_HEADER);
    frame.extend_from_slice(&(total as u16).to_le_bytes());
    frame.extend_from_slice(&r.timestamp_ms.to_le_bytes());
    frame.push(r.status_byte());
    frame.extend_from_slice(&r.latitude.to_le_bytes());
    frame.extend_from_slice(&r.longitude.to_le_bytes());
    frame.extend_from_slice(&r.speed_knots.to_le_bytes());
    frame.push(entries.len() as u8);
    for entry in entries {
        frame.extend_from_slice(&entry.id.to_le_bytes());
        frame.push(entry.dlc);
        frame.extend_from_slice(&entry.data);
    }
    seal(frame)
}

fn encode_env(r: &EnvRecord) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ENV_FRAME_LEN);
    frame.extend_from_slice(&FRAME_HEADER);
    frame.extend_from_slice(&(ENV_FRAME_LEN as u16).to_le_bytes());
    frame.extend_from_slice(&r.timestamp_ms.to_le_bytes());
    frame.push(r.status_byte());
    frame.extend_from_slice(&r.distance_cm.to_le_bytes());
    frame.extend_from_slice(&r.signal_strength.to_le_bytes());
    frame.extend_from_slice(&r.co2_ppm.to_le_bytes());
    seal(frame)
}

/// 追加校验和与帧尾
fn seal(mut frame: Vec<u8>) -> Vec<u8> {
    let chk = checksum(&frame[TIMESTAMP_OFFSET..]);
    frame.push(chk);
    frame.extend_from_slice(&FRAME_FOOTER);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::record::{CanEntry, DeviceVariant};

    #[test]
    fn test_encode_env_layout() {
        let r = EnvRecord {
            timestamp_ms: 0x0403_0201,
            lidar_connected: true,
            co2_connected: false,
            distance_cm: 0x1234,
            signal_strength: 0x5678,
            co2_ppm: 0x9ABC,
        };
        let frame = encode(&DeviceRecord::Env(r));
        assert_eq!(frame.len(), ENV_FRAME_LEN);
        assert_eq!(frame[..2], FRAME_HEADER[..]);
        assert_eq!(frame[2..4], [0x12, 0x00][..]);
        assert_eq!(frame[4..8], [0x01, 0x02, 0x03, 0x04][..]);
        assert_eq!(frame[8], STATUS_LIDAR_CONN);
        assert_eq!(frame[9..11], [0x34, 0x12][..]); // u16 LE
        assert_eq!(frame[16..], FRAME_FOOTER[..]);
    }

    #[test]
    fn test_encode_decode_gps_can_with_entries() {
        let record = GpsCanRecord {
            timestamp_ms: 555_000,
            gps_fix: true,
            gps_connected: true,
            can_active: true,
            latitude: 45.4642,
            longitude: 9.1900,
            speed_knots: 12.5,
            can_entries: vec![
                CanEntry {
                    id: 0x7E8,
                    dlc: 8,
                    data: [1, 2, 3, 4, 5, 6, 7, 8],
                },
                CanEntry {
                    id: 0x100,
                    dlc: 0,
                    data: [0; 8],
                },
            ],
        };
        let frame = encode(&DeviceRecord::GpsCan(record.clone()));
        assert_eq!(frame.len(), GPS_CAN_MIN_LEN + 2 * CAN_ENTRY_LEN);

        let decoded = decode(&frame, DeviceVariant::GpsCan).unwrap();
        assert_eq!(decoded, DeviceRecord::GpsCan(record));
    }

    #[test]
    fn test_encode_truncates_oversized_can_list() {
        let entry = CanEntry {
            id: 0x7E8,
            dlc: 8,
            data: [0xAB; 8],
        };
        let record = GpsCanRecord {
            timestamp_ms: 1,
            gps_fix: false,
            gps_connected: true,
            can_active: true,
            latitude: 0.0,
            longitude: 0.0,
            speed_knots: 0.0,
            can_entries: vec![entry; MAX_CAN_ENTRIES + 50],
        };
        let frame = encode(&DeviceRecord::GpsCan(record));
        assert_eq!(frame.len(), GPS_CAN_MIN_LEN + MAX_CAN_ENTRIES * CAN_ENTRY_LEN);
        assert!(frame.len() <= GPS_CAN_MAX_LEN);

        let DeviceRecord::GpsCan(decoded) = decode(&frame, DeviceVariant::GpsCan).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(decoded.can_entries.len(), MAX_CAN_ENTRIES);
    }
}
