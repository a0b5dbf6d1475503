//! # Venado Protocol
//!
//! 遥测集线器二进制帧协议定义（无硬件依赖）。
//!
//! 两台 ESP32 集线器通过 UART 以 1Hz 发送二进制帧，帧结构统一：
//!
//! ```text
//! [Header: AA 55] [Length: u16 LE] [Timestamp: u32 LE] [Status: u8]
//! [Payload: 变长/定长] [Checksum: u8 XOR] [Footer: 0D 0A]
//! ```
//!
//! - **变体 A（GPS+CAN）**：GPS 定长字段 + 计数前缀的 CAN 报文列表，
//!   帧长 25–1500 字节。
//! - **变体 B（Lidar+CO2）**：定长 18 字节。
//!
//! 校验和为 Length 字段之后、Checksum 之前所有字节的 XOR。
//! 数值全部为小端字节序，浮点为 IEEE-754 binary32。
//!
//! ## 模块
//!
//! - `constants`: 帧常量与状态位定义
//! - `record`: 解码后的记录类型（tagged enum）
//! - `decode`: 帧解码（纯函数，不做 I/O）
//! - `encode`: 帧编码（mock 数据源与回路测试使用）
//!
//! ## 设计约束
//!
//! 解码器对任意输入字节都不得 panic：所有失败路径返回 [`ProtocolError`]，
//! 调用方将解码失败视为丢帧而非致命错误。

pub mod constants;
pub mod decode;
pub mod encode;
pub mod record;

pub use constants::*;
pub use decode::{checksum, decode};
pub use encode::{MAX_CAN_ENTRIES, encode};
pub use record::{CanEntry, DeviceRecord, DeviceVariant, EnvRecord, GpsCanRecord};

use thiserror::Error;

/// 帧解码错误类型
///
/// 所有变体都表示"该帧作废"，调用方应丢弃并重新同步。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// 帧短于最小结构（头+长度+时间戳+状态+校验+尾 = 12 字节）
    #[error("Frame too short: {len} bytes")]
    TooShort { len: usize },

    /// 帧尾不是 0x0D 0x0A
    #[error("Invalid footer: {footer:02X?}")]
    BadFooter { footer: [u8; 2] },

    /// XOR 校验和不匹配
    #[error("Checksum mismatch: expected {expected:#04X}, got {actual:#04X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// 声明长度超出该变体允许的范围
    #[error("Invalid declared length {declared} for {variant:?} frame")]
    InvalidLength {
        declared: usize,
        variant: record::DeviceVariant,
    },

    /// 声明长度与实际缓冲区大小不一致
    #[error("Declared length {declared} does not match frame size {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}
