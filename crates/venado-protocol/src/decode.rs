//! 帧解码
//!
//! 入口为 [`decode`]：对一个完整的候选帧缓冲区做尾部、校验和、长度
//! 三级验证，然后按变体提取字段。解码器是纯函数，对任意输入不 panic。
//!
//! 验证顺序（与固件对端约定一致）：
//!
//! 1. 帧尾必须为 `0D 0A`，否则立即拒绝；
//! 2. XOR 校验和覆盖长度字段之后、校验字节之前的所有字节；
//! 3. 声明长度按变体检查范围（A: 25–1500，B: 恰好 18）。
//!
//! 变体 A 的 CAN 列表允许被截断：声明计数大于实际剩余字节时提前
//! 停止，产出较短的列表而不报错（固件在帧长逼近上限时会截断列表）。

use crate::ProtocolError;
use crate::constants::*;
use crate::record::{CanEntry, DeviceRecord, DeviceVariant, EnvRecord, GpsCanRecord};

/// 计算 XOR 校验和
///
/// 覆盖范围由调用方给定；协议规定为 `raw[4..len-3]`
/// （长度字段之后到校验字节之前）。
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// 解码一个候选帧
///
/// `raw` 必须是从帧头到帧尾的完整缓冲区（读取端按声明长度重组后传入）。
/// `variant` 由读取端配置给定，不从字节流推断。
pub fn decode(raw: &[u8], variant: DeviceVariant) -> Result<DeviceRecord, ProtocolError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::TooShort { len: raw.len() });
    }

    // 1. 帧尾
    let footer = [raw[raw.len() - 2], raw[raw.len() - 1]];
    if footer != FRAME_FOOTER {
        return Err(ProtocolError::BadFooter { footer });
    }

    // 2. XOR 校验和
    let expected = checksum(&raw[TIMESTAMP_OFFSET..raw.len() - 3]);
    let actual = raw[raw.len() - 3];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    // 3. 声明长度
    let declared = usize::from(u16::from_le_bytes([raw[2], raw[3]]));
    match variant {
        DeviceVariant::GpsCan => {
            if !(GPS_CAN_MIN_LEN..=GPS_CAN_MAX_LEN).contains(&declared) {
                return Err(ProtocolError::InvalidLength { declared, variant });
            }
            if declared != raw.len() {
                return Err(ProtocolError::LengthMismatch {
                    declared,
                    actual: raw.len(),
                });
            }
            Ok(DeviceRecord::GpsCan(decode_gps_can(raw)))
        }
        DeviceVariant::Env => {
            if declared != ENV_FRAME_LEN {
                return Err(ProtocolError::InvalidLength { declared, variant });
            }
            if raw.len() != ENV_FRAME_LEN {
                return Err(ProtocolError::LengthMismatch {
                    declared,
                    actual: raw.len(),
                });
            }
            Ok(DeviceRecord::Env(decode_env(raw)))
        }
    }
}

/// 变体 A 字段提取（调用前已完成长度验证）
fn decode_gps_can(raw: &[u8]) -> GpsCanRecord {
    let timestamp_ms = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let status = raw[STATUS_OFFSET];

    let latitude = f32::from_le_bytes([raw[9], raw[10], raw[11], raw[12]]);
    let longitude = f32::from_le_bytes([raw[13], raw[14], raw[15], raw[16]]);
    let speed_knots = f32::from_le_bytes([raw[17], raw[18], raw[19], raw[20]]);

    let can_count = usize::from(raw[21]);
    let mut can_entries = Vec::with_capacity(can_count.min(64));
    let mut offset = 22;
    // 校验字节位于 raw.len()-3，CAN 区域到此为止；
    // 声明计数超出剩余空间时列表截断，不算错误。
    let can_end = raw.len() - 3;
    for _ in 0..can_count {
        if offset + CAN_ENTRY_LEN > can_end {
            break;
        }
        let id = u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]]);
        let dlc = raw[offset + 4];
        let mut data = [0u8; 8];
        data.copy_from_slice(&raw[offset + 5..offset + 13]);
        can_entries.push(CanEntry { id, dlc, data });
        offset += CAN_ENTRY_LEN;
    }

    GpsCanRecord {
        timestamp_ms,
        gps_fix: status & STATUS_GPS_FIX != 0,
        gps_connected: status & STATUS_GPS_CONN != 0,
        can_active: status & STATUS_CAN_ACTIVE != 0,
        latitude,
        longitude,
        speed_knots,
        can_entries,
    }
}

/// 变体 B 字段提取（调用前已完成长度验证）
fn decode_env(raw: &[u8]) -> EnvRecord {
    let timestamp_ms = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let status = raw[STATUS_OFFSET];

    EnvRecord {
        timestamp_ms,
        lidar_connected: status & STATUS_LIDAR_CONN != 0,
        co2_connected: status & STATUS_CO2_CONN != 0,
        distance_cm: u16::from_le_bytes([raw[9], raw[10]]),
        signal_strength: u16::from_le_bytes([raw[11], raw[12]]),
        co2_ppm: u16::from_le_bytes([raw[13], raw[14]]),
    }
}
