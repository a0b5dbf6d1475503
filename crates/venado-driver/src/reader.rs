//! 设备读取线程
//!
//! 每台物理集线器一条线程，跑一个四态循环：
//!
//! ```text
//! Disconnected -> Connecting -> Synchronizing -> Streaming
//!        ^                            ^              |
//!        |        IO 错误             |   解码失败    |
//!        +----------------------------+--------------+
//! ```
//!
//! - *Connecting*: 通过 connector 打开链路，失败退避后无限重试；
//! - *Synchronizing*: 逐字节扫描 `AA 55` 帧头，之前的字节静默丢弃；
//! - *Streaming*: 读长度字段、按声明长度读齐帧体、交给解码器。
//!   解码成功写入缓冲并发事件；解码失败/半截帧只回到重同步，不重连。
//!
//! 任何 IO 错误都清缓冲、发断连事件、退避后重连。阻塞读取都带
//! 超时上界，stop 请求最迟一个读超时周期内生效。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};
use venado_protocol::{
    DeviceVariant, ENV_FRAME_LEN, FRAME_HEADER, GPS_CAN_MAX_LEN, GPS_CAN_MIN_LEN, decode,
};
use venado_serial::{SerialConnector, SerialError, SerialLink};

use crate::buffer::DeviceBuffer;
use crate::metrics::DriverMetrics;

/// 读取线程发往融合线程的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    /// 该设备的缓冲刚被一条新记录覆盖
    Record { variant: DeviceVariant },
    /// 连接状态变化（断开时缓冲已由读取线程清空）
    Connection {
        variant: DeviceVariant,
        connected: bool,
    },
}

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        // 看门狗线程负责真正的 join，超时后任其自生自灭，进程退出时由 OS 回收
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 设备读取线程句柄
pub struct DeviceReader {
    variant: DeviceVariant,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceReader {
    /// 启动读取线程
    pub fn spawn(
        variant: DeviceVariant,
        mut connector: Box<dyn SerialConnector>,
        buffer: Arc<DeviceBuffer>,
        events: Sender<ReaderEvent>,
        metrics: Arc<DriverMetrics>,
        backoff: Duration,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let handle = spawn(move || {
            read_loop(
                variant,
                connector.as_mut(),
                &buffer,
                &events,
                &metrics,
                backoff,
                &running_clone,
            );
        });
        Self {
            variant,
            running,
            handle: Some(handle),
        }
    }

    /// 请求线程退出并等待，幂等
    ///
    /// 返回后不再有任何事件/缓冲更新来自该线程。
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join_timeout(Duration::from_secs(5)).is_err()
        {
            error!(device = ?self.variant, "Reader thread failed to shut down in time");
        }
    }
}

impl Drop for DeviceReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 声明长度的合法范围（按变体）
fn length_bounds(variant: DeviceVariant) -> (usize, usize) {
    match variant {
        DeviceVariant::GpsCan => (GPS_CAN_MIN_LEN, GPS_CAN_MAX_LEN),
        DeviceVariant::Env => (ENV_FRAME_LEN, ENV_FRAME_LEN),
    }
}

/// 分片退避睡眠，期间响应 stop
fn backoff_sleep(backoff: Duration, running: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let mut remaining = backoff;
    while remaining > Duration::ZERO && running.load(Ordering::Acquire) {
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining -= step;
    }
}

/// 读取线程主循环（Connecting 态 + 重连退避）
fn read_loop(
    variant: DeviceVariant,
    connector: &mut dyn SerialConnector,
    buffer: &DeviceBuffer,
    events: &Sender<ReaderEvent>,
    metrics: &DriverMetrics,
    backoff: Duration,
    running: &AtomicBool,
) {
    while running.load(Ordering::Acquire) {
        let mut link = match connector.connect() {
            Ok(link) => link,
            Err(e) => {
                warn!(device = ?variant, port = %connector.describe(), error = %e, "Failed to open serial port, retrying");
                backoff_sleep(backoff, running);
                continue;
            }
        };
        // 丢掉重连前积压的半截帧
        if let Err(e) = link.clear_input() {
            warn!(device = ?variant, error = %e, "Failed to clear input buffer");
            backoff_sleep(backoff, running);
            continue;
        }

        info!(device = ?variant, port = %connector.describe(), "Serial link established");
        metrics.connects.fetch_add(1, Ordering::Relaxed);
        let _ = events.send(ReaderEvent::Connection {
            variant,
            connected: true,
        });

        let session_error = stream_session(variant, link.as_mut(), buffer, events, metrics, running);

        // 断开：无论原因，该设备立即从融合中消失
        buffer.clear();
        let _ = events.send(ReaderEvent::Connection {
            variant,
            connected: false,
        });

        match session_error {
            Some(e) => {
                warn!(device = ?variant, error = %e, "Serial link lost, reconnecting");
                backoff_sleep(backoff, running);
            }
            // stop 请求，正常退出
            None => break,
        }
    }
    debug!(device = ?variant, "Reader thread exited");
}

/// Synchronizing + Streaming 态：跑到 IO 错误或 stop 为止
///
/// 返回 `Some(err)` 表示链路故障需要重连，`None` 表示收到 stop。
fn stream_session(
    variant: DeviceVariant,
    link: &mut dyn SerialLink,
    buffer: &DeviceBuffer,
    events: &Sender<ReaderEvent>,
    metrics: &DriverMetrics,
    running: &AtomicBool,
) -> Option<SerialError> {
    let (min_len, max_len) = length_bounds(variant);
    let mut frame = Vec::with_capacity(max_len);

    'resync: loop {
        if !running.load(Ordering::Acquire) {
            return None;
        }

        // Synchronizing: 逐字节找 AA
        match link.read_byte() {
            Err(e) => return Some(e),
            Ok(None) => continue 'resync,
            Ok(Some(b)) if b == FRAME_HEADER[0] => {}
            Ok(Some(_)) => {
                metrics.resync_bytes.fetch_add(1, Ordering::Relaxed);
                continue 'resync;
            }
        }
        // 第二字节必须是 55，否则把两个字节都算丢弃
        match link.read_byte() {
            Err(e) => return Some(e),
            Ok(Some(b)) if b == FRAME_HEADER[1] => {}
            // 超时没等到第二字节，作废的只有 AA 这一个
            Ok(None) => {
                metrics.resync_bytes.fetch_add(1, Ordering::Relaxed);
                continue 'resync;
            }
            Ok(Some(_)) => {
                metrics.resync_bytes.fetch_add(2, Ordering::Relaxed);
                continue 'resync;
            }
        }

        // Streaming: 长度字段
        let mut len_buf = [0u8; 2];
        match link.read_exact(&mut len_buf) {
            Err(SerialError::Timeout) => continue 'resync,
            Err(e) => return Some(e),
            Ok(()) => {}
        }
        let declared = usize::from(u16::from_le_bytes(len_buf));
        if declared < min_len || declared > max_len {
            debug!(device = ?variant, declared, "Declared frame length out of bounds");
            metrics.bad_lengths.fetch_add(1, Ordering::Relaxed);
            continue 'resync;
        }

        // 帧体：头(2) + 长度(2) 已读，还差 declared - 4 字节
        frame.clear();
        frame.extend_from_slice(&FRAME_HEADER);
        frame.extend_from_slice(&len_buf);
        frame.resize(declared, 0);
        match link.read_exact(&mut frame[4..]) {
            // 半截帧视为作废，回到重同步，不重连
            Err(SerialError::Timeout) => {
                metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                continue 'resync;
            }
            Err(e) => return Some(e),
            Ok(()) => {}
        }

        match decode(&frame, variant) {
            Ok(record) => {
                buffer.store(record);
                metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
                let _ = events.send(ReaderEvent::Record { variant });
            }
            Err(e) => {
                debug!(device = ?variant, error = %e, "Dropping corrupt frame");
                metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use venado_protocol::{DeviceRecord, EnvRecord, encode};
    use venado_serial::mock::{MockAction, MockConnector, MockLink};

    fn env_frame(ts: u32) -> Vec<u8> {
        encode(&DeviceRecord::Env(EnvRecord {
            timestamp_ms: ts,
            lidar_connected: true,
            co2_connected: true,
            distance_cm: 123,
            signal_strength: 456,
            co2_ppm: 789,
        }))
    }

    #[test]
    fn test_reader_decodes_frame_with_leading_garbage() {
        let mut bytes = vec![0x00, 0xFF, 0xAA, 0x13];
        bytes.extend(env_frame(42));
        let connector = MockConnector::new([MockLink::from_bytes(bytes)]);

        let buffer = Arc::new(DeviceBuffer::new());
        let metrics = Arc::new(DriverMetrics::new());
        let (tx, rx) = unbounded();
        let mut reader = DeviceReader::spawn(
            DeviceVariant::Env,
            Box::new(connector),
            buffer.clone(),
            tx,
            metrics.clone(),
            Duration::from_millis(10),
        );

        // 等到 Record 事件
        let mut saw_record = false;
        for _ in 0..50 {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(ReaderEvent::Record { .. }) => {
                    saw_record = true;
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        assert!(saw_record);
        let slot = buffer.load().unwrap();
        assert_eq!(slot.record.timestamp_ms(), 42);
        assert!(metrics.snapshot().resync_bytes >= 2);
        reader.stop();
    }

    #[test]
    fn test_lone_header_byte_before_timeout_counts_once() {
        // AA 之后超时：只作废一个字节，随后的完整帧照常解码
        let connector = MockConnector::new([MockLink::new([
            MockAction::Data(vec![0xAA]),
            MockAction::Timeout,
            MockAction::Data(env_frame(7)),
        ])]);

        let buffer = Arc::new(DeviceBuffer::new());
        let metrics = Arc::new(DriverMetrics::new());
        let (tx, rx) = unbounded();
        let mut reader = DeviceReader::spawn(
            DeviceVariant::Env,
            Box::new(connector),
            buffer.clone(),
            tx,
            metrics.clone(),
            Duration::from_millis(10),
        );

        let mut saw_record = false;
        for _ in 0..50 {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(ReaderEvent::Record { .. }) => {
                    saw_record = true;
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        assert!(saw_record);
        assert_eq!(buffer.load().unwrap().record.timestamp_ms(), 7);
        assert_eq!(metrics.snapshot().resync_bytes, 1);
        reader.stop();
    }

    #[test]
    fn test_reader_reconnects_after_io_error() {
        let first = MockLink::new([
            MockAction::Data(env_frame(1)),
            MockAction::Error,
        ]);
        let second = MockLink::from_bytes(env_frame(2));
        let connector = MockConnector::new([first, second]);

        let buffer = Arc::new(DeviceBuffer::new());
        let metrics = Arc::new(DriverMetrics::new());
        let (tx, rx) = unbounded();
        let mut reader = DeviceReader::spawn(
            DeviceVariant::Env,
            Box::new(connector),
            buffer.clone(),
            tx,
            metrics.clone(),
            Duration::from_millis(10),
        );

        // 期望事件序列包含：连接、记录、断开、再连接、记录
        let mut records = 0;
        let mut disconnects = 0;
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while std::time::Instant::now() < deadline && records < 2 {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(ReaderEvent::Record { .. }) => records += 1,
                Ok(ReaderEvent::Connection {
                    connected: false, ..
                }) => disconnects += 1,
                Ok(_) => {}
                Err(_) => {}
            }
        }
        assert_eq!(records, 2);
        assert!(disconnects >= 1);
        assert!(metrics.snapshot().connects >= 2);
        reader.stop();
    }

    #[test]
    fn test_reader_stop_is_idempotent() {
        let connector = MockConnector::new([MockLink::new([])]);
        let (tx, _rx) = unbounded();
        let mut reader = DeviceReader::spawn(
            DeviceVariant::Env,
            Box::new(connector),
            Arc::new(DeviceBuffer::new()),
            tx,
            Arc::new(DriverMetrics::new()),
            Duration::from_millis(10),
        );
        reader.stop();
        reader.stop();
    }
}
