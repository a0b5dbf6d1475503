//! Mock 串口后端（无硬件依赖）
//!
//! 两类实现：
//!
//! - [`MockLink`] / [`MockConnector`]：脚本化回放，逐字节按预排的
//!   动作序列出数据/超时/错误，驱动层单测用它构造重同步、断线
//!   重连等场景；
//! - [`SimLink`] / [`SimConnector`]：持续生成合法帧的仿真集线器，
//!   `--mock` 运行与长跑冒烟用。

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use rand::Rng;
use venado_protocol::{
    CanEntry, DeviceRecord, DeviceVariant, EnvRecord, GpsCanRecord, encode,
};

use crate::{SerialConnector, SerialError, SerialLink};

/// 脚本动作：一次 `read_byte` 轮询的结果
#[derive(Debug, Clone)]
pub enum MockAction {
    /// 依次吐出这些字节
    Data(Vec<u8>),
    /// 一次超时（`read_byte` 返回 `Ok(None)`）
    Timeout,
    /// 一次 IO 错误，触发读取线程进入重连
    Error,
}

/// 脚本化串口链路
pub struct MockLink {
    pending: VecDeque<u8>,
    script: VecDeque<MockAction>,
}

impl MockLink {
    pub fn new(script: impl IntoIterator<Item = MockAction>) -> Self {
        Self {
            pending: VecDeque::new(),
            script: script.into_iter().collect(),
        }
    }

    /// 单段数据脚本的简写
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new([MockAction::Data(bytes.into())])
    }

    fn next_event(&mut self) -> Result<Option<u8>, SerialError> {
        loop {
            if let Some(b) = self.pending.pop_front() {
                return Ok(Some(b));
            }
            match self.script.pop_front() {
                Some(MockAction::Data(bytes)) => {
                    self.pending.extend(bytes);
                }
                Some(MockAction::Timeout) => {
                    std::thread::sleep(Duration::from_millis(1));
                    return Ok(None);
                }
                Some(MockAction::Error) => {
                    return Err(SerialError::Io(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "mock link error",
                    )));
                }
                // 脚本耗尽后表现为持续超时；小睡避免调用方空转
                None => {
                    std::thread::sleep(Duration::from_millis(1));
                    return Ok(None);
                }
            }
        }
    }
}

impl SerialLink for MockLink {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        self.next_event()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SerialError> {
        for slot in buf.iter_mut() {
            match self.next_event()? {
                Some(b) => *slot = b,
                None => return Err(SerialError::Timeout),
            }
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.pending.clear();
        Ok(())
    }
}

/// 脚本化链路工厂：每次 `connect` 弹出一条预排的链路
///
/// 队列耗尽后 `connect` 返回错误，模拟设备彻底消失。
pub struct MockConnector {
    links: VecDeque<MockLink>,
    label: String,
}

impl MockConnector {
    pub fn new(links: impl IntoIterator<Item = MockLink>) -> Self {
        Self {
            links: links.into_iter().collect(),
            label: "mock".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl SerialConnector for MockConnector {
    fn connect(&mut self) -> Result<Box<dyn SerialLink>, SerialError> {
        match self.links.pop_front() {
            Some(link) => Ok(Box::new(link)),
            None => Err(SerialError::Open {
                port: self.label.clone(),
                source: serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "mock connector exhausted",
                ),
            }),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// 仿真集线器链路：按固定间隔生成合法帧
///
/// 数值围绕一组基准值随机游走，时间戳为链路建立以来的毫秒数，
/// 与真实设备的"开机毫秒数"语义一致。
pub struct SimLink {
    variant: DeviceVariant,
    interval: Duration,
    started: Instant,
    next_emit: Instant,
    pending: VecDeque<u8>,
}

impl SimLink {
    pub fn new(variant: DeviceVariant, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            variant,
            interval,
            started: now,
            next_emit: now,
            pending: VecDeque::new(),
        }
    }

    fn generate_frame(&self) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        let timestamp_ms = self.started.elapsed().as_millis() as u32;
        let record = match self.variant {
            DeviceVariant::GpsCan => DeviceRecord::GpsCan(GpsCanRecord {
                timestamp_ms,
                gps_fix: true,
                gps_connected: true,
                can_active: true,
                latitude: 45.4642 + rng.gen_range(-0.001f32..0.001),
                longitude: 9.1900 + rng.gen_range(-0.001f32..0.001),
                speed_knots: rng.gen_range(0.0f32..30.0),
                can_entries: vec![CanEntry {
                    id: 0x7E8,
                    dlc: 8,
                    data: rng.r#gen(),
                }],
            }),
            DeviceVariant::Env => DeviceRecord::Env(EnvRecord {
                timestamp_ms,
                lidar_connected: true,
                co2_connected: true,
                distance_cm: rng.gen_range(50..500),
                signal_strength: rng.gen_range(100..2000),
                co2_ppm: rng.gen_range(400..1200),
            }),
        };
        encode(&record)
    }
}

impl SerialLink for SimLink {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(Some(b));
        }
        let now = Instant::now();
        if now < self.next_emit {
            // 不满帧间隔时小睡一段，模拟阻塞读
            std::thread::sleep((self.next_emit - now).min(Duration::from_millis(20)));
            if Instant::now() < self.next_emit {
                return Ok(None);
            }
        }
        self.next_emit += self.interval;
        self.pending.extend(self.generate_frame());
        Ok(self.pending.pop_front())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SerialError> {
        for slot in buf.iter_mut() {
            loop {
                match self.read_byte()? {
                    Some(b) => {
                        *slot = b;
                        break;
                    }
                    None => continue,
                }
            }
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.pending.clear();
        Ok(())
    }
}

/// 仿真集线器工厂（每次重连产出一条新的 [`SimLink`]）
pub struct SimConnector {
    variant: DeviceVariant,
    interval: Duration,
}

impl SimConnector {
    pub fn new(variant: DeviceVariant) -> Self {
        Self {
            variant,
            interval: Duration::from_secs(1),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl SerialConnector for SimConnector {
    fn connect(&mut self) -> Result<Box<dyn SerialLink>, SerialError> {
        Ok(Box::new(SimLink::new(self.variant, self.interval)))
    }

    fn describe(&self) -> String {
        match self.variant {
            DeviceVariant::GpsCan => "sim:gps-can".to_string(),
            DeviceVariant::Env => "sim:env".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venado_protocol::decode;

    #[test]
    fn test_mock_link_replays_script() {
        let mut link = MockLink::new([
            MockAction::Data(vec![0x01, 0x02]),
            MockAction::Timeout,
            MockAction::Data(vec![0x03]),
        ]);
        assert_eq!(link.read_byte().unwrap(), Some(0x01));
        assert_eq!(link.read_byte().unwrap(), Some(0x02));
        assert_eq!(link.read_byte().unwrap(), None);
        assert_eq!(link.read_byte().unwrap(), Some(0x03));
        // 脚本耗尽：持续超时
        assert_eq!(link.read_byte().unwrap(), None);
    }

    #[test]
    fn test_mock_link_read_exact_timeout_on_starvation() {
        let mut link = MockLink::new([MockAction::Data(vec![0xAA]), MockAction::Timeout]);
        let mut buf = [0u8; 2];
        assert!(matches!(
            link.read_exact(&mut buf),
            Err(SerialError::Timeout)
        ));
    }

    #[test]
    fn test_mock_connector_exhaustion() {
        let mut conn = MockConnector::new([MockLink::from_bytes(vec![0x01])]);
        assert!(conn.connect().is_ok());
        assert!(matches!(conn.connect(), Err(SerialError::Open { .. })));
    }

    #[test]
    fn test_sim_link_emits_decodable_frames() {
        let mut link = SimLink::new(DeviceVariant::Env, Duration::from_millis(1));
        // 读出一个完整帧：头两个字节 + 长度 + 其余
        let mut frame = Vec::new();
        while frame.len() < 18 {
            if let Some(b) = link.read_byte().unwrap() {
                frame.push(b);
            }
        }
        assert_eq!(frame[..2], [0xAA, 0x55][..]);
        assert!(decode(&frame, DeviceVariant::Env).is_ok());
    }
}
