//! # Venado Serial Adapter Layer
//!
//! 串口硬件抽象层，提供统一的字节流接口抽象。
//!
//! 上层（venado-driver 的读取线程）只依赖 [`SerialLink`] /
//! [`SerialConnector`] 两个 trait，不直接接触 `serialport`：
//!
//! - 生产环境使用 [`PortConnector`] 打开物理 UART；
//! - 测试与 `--mock` 运行使用 `mock` 模块的脚本化/仿真实现。
//!
//! 读取语义按字节流建模：`read_byte` 返回 `Ok(None)` 表示本轮超时
//! 无数据（正常，集线器按 1Hz 发帧），`Err` 表示链路故障需要重连。

use std::io;
use std::time::Duration;

use thiserror::Error;

pub mod port;
pub use port::{PortConnector, PortLink};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    /// 打开端口失败（设备不存在、权限不足等）
    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    /// 定长读取在超时内未凑齐
    #[error("Read timeout")]
    Timeout,
    /// 对端关闭或设备被拔出
    #[error("Device disconnected")]
    Disconnected,
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
}

/// 已打开的串口链路（阻塞式字节流）
pub trait SerialLink: Send {
    /// 读取单个字节
    ///
    /// `Ok(None)` 表示读超时内无数据；调用方继续轮询即可。
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError>;

    /// 定长读取，在读超时内凑不齐时返回 [`SerialError::Timeout`]
    ///
    /// 用于按声明长度读入帧体；超时即认为该帧作废。
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SerialError>;

    /// 丢弃驱动输入缓冲中的积压字节
    ///
    /// 连接建立后调用一次，避免把重连前的半截帧喂进解码器。
    fn clear_input(&mut self) -> Result<(), SerialError>;
}

/// 串口链路工厂
///
/// 读取线程每次（重）连接都通过 connector 拿一条新链路，
/// 这样 mock 实现可以为每次连接排一段不同的脚本。
pub trait SerialConnector: Send {
    fn connect(&mut self) -> Result<Box<dyn SerialLink>, SerialError>;

    /// 人类可读的端口描述，用于日志
    fn describe(&self) -> String;
}

/// 串口打开参数
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl SerialSettings {
    pub fn new(path: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout,
        }
    }
}
