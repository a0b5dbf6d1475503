//! 同步器构建器
//!
//! 默认参数对应树莓派载板上的实际接线：GPS+CAN 集线器在
//! `/dev/ttyAMA0`，Lidar+CO2 集线器在 `/dev/ttyAMA2`，均为 115200。
//! 测试与 `--mock` 运行通过 `gps_connector`/`env_connector` 注入
//! 自定义链路工厂，绕过物理串口。

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use venado_protocol::DeviceVariant;
use venado_serial::{PortConnector, SerialConnector, SerialSettings};

use crate::buffer::DeviceBuffer;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::metrics::DriverMetrics;
use crate::reader::DeviceReader;
use crate::sync::DualSynchronizer;

/// [`DualSynchronizer`] 构建器
pub struct SynchronizerBuilder {
    gps_port: String,
    env_port: String,
    baud_rate: u32,
    read_timeout: Duration,
    config: DriverConfig,
    gps_connector: Option<Box<dyn SerialConnector>>,
    env_connector: Option<Box<dyn SerialConnector>>,
}

impl Default for SynchronizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SynchronizerBuilder {
    pub fn new() -> Self {
        Self {
            gps_port: "/dev/ttyAMA0".to_string(),
            env_port: "/dev/ttyAMA2".to_string(),
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(2),
            config: DriverConfig::default(),
            gps_connector: None,
            env_connector: None,
        }
    }

    pub fn gps_port(mut self, port: impl Into<String>) -> Self {
        self.gps_port = port.into();
        self
    }

    pub fn env_port(mut self, port: impl Into<String>) -> Self {
        self.env_port = port.into();
        self
    }

    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn sync_window(mut self, window: Duration) -> Self {
        self.config.sync_window = window;
        self
    }

    pub fn buffer_timeout(mut self, timeout: Duration) -> Self {
        self.config.buffer_timeout = timeout;
        self
    }

    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.config.reconnect_backoff = backoff;
        self
    }

    /// 注入 GPS+CAN 侧链路工厂（替代物理串口）
    pub fn gps_connector(mut self, connector: Box<dyn SerialConnector>) -> Self {
        self.gps_connector = Some(connector);
        self
    }

    /// 注入 Lidar+CO2 侧链路工厂（替代物理串口）
    pub fn env_connector(mut self, connector: Box<dyn SerialConnector>) -> Self {
        self.env_connector = Some(connector);
        self
    }

    /// 校验配置、启动读取线程与融合线程
    pub fn build(self) -> Result<DualSynchronizer, DriverError> {
        if self.config.sync_window > self.config.buffer_timeout {
            return Err(DriverError::InvalidConfig(format!(
                "sync window ({:?}) must not exceed buffer timeout ({:?})",
                self.config.sync_window, self.config.buffer_timeout
            )));
        }
        // 只有两边都走物理串口时端口才必须不同
        if self.gps_connector.is_none() && self.env_connector.is_none() && self.gps_port == self.env_port
        {
            return Err(DriverError::InvalidConfig(format!(
                "both hubs configured on the same port {}",
                self.gps_port
            )));
        }

        let gps_connector = self.gps_connector.unwrap_or_else(|| {
            Box::new(PortConnector::new(SerialSettings::new(
                self.gps_port.clone(),
                self.baud_rate,
                self.read_timeout,
            )))
        });
        let env_connector = self.env_connector.unwrap_or_else(|| {
            Box::new(PortConnector::new(SerialSettings::new(
                self.env_port.clone(),
                self.baud_rate,
                self.read_timeout,
            )))
        });

        let gps_buffer = Arc::new(DeviceBuffer::new());
        let env_buffer = Arc::new(DeviceBuffer::new());
        let metrics = Arc::new(DriverMetrics::new());
        let (events_tx, events_rx) = unbounded();

        let readers = vec![
            DeviceReader::spawn(
                DeviceVariant::GpsCan,
                gps_connector,
                gps_buffer.clone(),
                events_tx.clone(),
                metrics.clone(),
                self.config.reconnect_backoff,
            ),
            DeviceReader::spawn(
                DeviceVariant::Env,
                env_connector,
                env_buffer.clone(),
                events_tx,
                metrics.clone(),
                self.config.reconnect_backoff,
            ),
        ];

        Ok(DualSynchronizer::start(
            readers,
            events_rx,
            gps_buffer,
            env_buffer,
            metrics,
            self.config,
        ))
    }
}
