//! 驱动层错误类型

use thiserror::Error;

/// 驱动构建/运行错误
///
/// 运行期的链路故障不走这里：读取线程内部带退避重试，
/// 只通过连接事件对外报告。
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
