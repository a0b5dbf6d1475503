//! OBD-II 报文粗解码
//!
//! 只覆盖车上实际出现的 mode 01 响应 PID，解不出来返回空串，
//! 结果嵌在 CSV 的 can_messages JSON 里辅助人工查看。

use venado_protocol::CanEntry;

/// 尝试解码一条 OBD-II mode 01 响应
pub fn decode_obd(entry: &CanEntry) -> String {
    let data = entry.payload();
    // mode 01 响应首字节为 0x41
    if data.len() < 3 || data[0] != 0x41 {
        return String::new();
    }
    let pid = data[1];
    match pid {
        // 发动机转速
        0x0C if data.len() >= 4 => {
            let rpm = ((u32::from(data[2]) << 8) | u32::from(data[3])) / 4;
            format!("RPM: {rpm}")
        }
        // 车速
        0x0D => format!("Speed: {} km/h", data[2]),
        // 冷却液温度
        0x05 => format!("Coolant: {}C", i16::from(data[2]) - 40),
        // 进气温度
        0x0F => format!("Intake Air: {}C", i16::from(data[2]) - 40),
        // 节气门开度
        0x11 => format!("Throttle: {:.1}%", f64::from(data[2]) * 100.0 / 255.0),
        // 油量
        0x2F => format!("Fuel: {:.1}%", f64::from(data[2]) * 100.0 / 255.0),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dlc: u8, data: [u8; 8]) -> CanEntry {
        CanEntry {
            id: 0x7E8,
            dlc,
            data,
        }
    }

    #[test]
    fn test_decode_rpm() {
        // 0x1AF8 / 4 = 1726
        let e = entry(4, [0x41, 0x0C, 0x1A, 0xF8, 0, 0, 0, 0]);
        assert_eq!(decode_obd(&e), "RPM: 1726");
    }

    #[test]
    fn test_decode_speed_and_coolant() {
        let e = entry(3, [0x41, 0x0D, 88, 0, 0, 0, 0, 0]);
        assert_eq!(decode_obd(&e), "Speed: 88 km/h");

        let e = entry(3, [0x41, 0x05, 30, 0, 0, 0, 0, 0]);
        assert_eq!(decode_obd(&e), "Coolant: -10C");
    }

    #[test]
    fn test_unknown_frames_decode_empty() {
        // 非 mode 01 响应
        let e = entry(3, [0x42, 0x0C, 0x00, 0, 0, 0, 0, 0]);
        assert_eq!(decode_obd(&e), "");
        // dlc 太短
        let e = entry(2, [0x41, 0x0C, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_obd(&e), "");
        // 未覆盖的 PID
        let e = entry(3, [0x41, 0x33, 0x10, 0, 0, 0, 0, 0]);
        assert_eq!(decode_obd(&e), "");
    }
}
