//! # Venado Logger
//!
//! 会话记录器：把融合样本流落成统一的 CSV 文件，会话结束自动
//! 压成 ZIP 归档，供远程接口列举和下载。
//!
//! - 一个会话一个文件：`session_<时间戳>.csv` -> `session_<时间戳>.zip`；
//! - 每 10 行 flush 一次，断电最多丢 10 条；
//! - 压缩成功后删除原 CSV；压缩失败只告警，CSV 保留。
//!
//! [`Recorder`] 是对外的录制开关，作为 sink 挂到同步器上：
//! 未开始录制时样本直接丢弃，录制中样本有界追加，不阻塞融合线程。

pub mod archive;
pub mod obd;
pub mod recorder;
pub mod session;

pub use archive::{ArchiveInfo, list_archives};
pub use recorder::Recorder;
pub use session::SessionWriter;
