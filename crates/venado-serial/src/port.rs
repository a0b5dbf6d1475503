//! 物理串口后端（`serialport` crate）
//!
//! 读取超时由驱动层报告为 `io::ErrorKind::TimedOut`，这里折算为
//! 链路语义：单字节读超时是正常空转，定长读超时是帧作废。

use std::io::{self, Read};
use std::time::Duration;

use tracing::debug;

use crate::{SerialConnector, SerialError, SerialLink, SerialSettings};

/// 物理串口链路
pub struct PortLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink for PortLink {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(SerialError::Disconnected),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SerialError::Io(e)),
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SerialError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => return Err(SerialError::Disconnected),
                Ok(n) => filled += n,
                // 定长读取中途超时：凑不齐就是帧作废
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(SerialError::Timeout),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SerialError::Io(e)),
            }
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

/// 物理串口工厂
pub struct PortConnector {
    settings: SerialSettings,
}

impl PortConnector {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }

    /// 默认硬件参数（115200 8N1，2s 读超时）
    pub fn with_defaults(path: impl Into<String>) -> Self {
        Self::new(SerialSettings::new(path, 115_200, Duration::from_secs(2)))
    }
}

impl SerialConnector for PortConnector {
    fn connect(&mut self) -> Result<Box<dyn SerialLink>, SerialError> {
        let port = serialport::new(&self.settings.path, self.settings.baud_rate)
            .timeout(self.settings.read_timeout)
            .open()
            .map_err(|source| SerialError::Open {
                port: self.settings.path.clone(),
                source,
            })?;
        debug!(
            port = %self.settings.path,
            baud = self.settings.baud_rate,
            timeout_ms = self.settings.read_timeout.as_millis() as u64,
            "Serial port opened"
        );
        Ok(Box::new(PortLink { port }))
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.settings.path, self.settings.baud_rate)
    }
}
