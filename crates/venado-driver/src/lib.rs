//! # Venado Driver
//!
//! 双集线器遥测驱动：每台设备一条阻塞读取线程负责字节流重同步、
//! 按长度重组帧并解码；融合线程把两路最新记录按时间窗策略合并为
//! 统一的 [`FusedSample`] 流。
//!
//! ## 架构
//!
//! ```text
//! [Reader A: GPS+CAN] --store--> [DeviceBuffer A] --\
//!        |                                           +--> fuse() --> sinks
//! [Reader B: Lidar+CO2] -store-> [DeviceBuffer B] --/
//!        |                                           ^
//!        +---- ReaderEvent (crossbeam channel) ------+
//! ```
//!
//! - 每个 buffer 由唯一的读取线程写入（record + 到达时刻整体原子
//!   替换），融合线程只读；
//! - 读取线程通过事件通道通知"有新记录/连接状态变化"，融合线程
//!   串行消费，保证每设备事件有序、全局每次最多一个融合在途；
//! - 融合策略：两路都新鲜且到达时刻相差 ≤ 同步窗则合并；只有一路
//!   新鲜则发部分样本（缺失侧字段取默认值）；都不新鲜则不发。
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use venado_driver::SynchronizerBuilder;
//!
//! # fn main() -> Result<(), venado_driver::DriverError> {
//! let sync = SynchronizerBuilder::new()
//!     .gps_port("/dev/ttyAMA0")
//!     .env_port("/dev/ttyAMA2")
//!     .build()?;
//! // sync.add_sink(...);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod builder;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reader;
pub mod sample;
pub mod sinks;
pub mod sync;

pub use buffer::{BufferSlot, DeviceBuffer};
pub use builder::SynchronizerBuilder;
pub use config::DriverConfig;
pub use error::DriverError;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use reader::{DeviceReader, ReaderEvent};
pub use sample::FusedSample;
pub use sinks::{SampleSink, SinkRegistry};
pub use sync::{DualSynchronizer, FuseOutcome, fuse};

pub use venado_protocol::DeviceVariant;
