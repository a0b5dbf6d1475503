//! 配置解析：TOML 文件 + 命令行覆盖

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::Cli;

/// 配置文件结构（所有字段可缺省）
///
/// ```toml
/// gps_port = "/dev/ttyAMA0"
/// env_port = "/dev/ttyAMA2"
/// baud = 115200
/// data_dir = "/var/lib/venado/data"
/// control_port = 3333
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    gps_port: Option<String>,
    env_port: Option<String>,
    baud: Option<u32>,
    data_dir: Option<PathBuf>,
    control_port: Option<u16>,
}

/// 解析完成的运行参数
#[derive(Debug)]
pub struct Settings {
    pub gps_port: String,
    pub env_port: String,
    pub baud: u32,
    pub data_dir: PathBuf,
    pub control_port: Option<u16>,
}

impl Settings {
    /// 优先级：命令行 > 配置文件 > 内置默认
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str::<FileConfig>(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        Ok(Self {
            gps_port: cli
                .gps_port
                .clone()
                .or(file.gps_port)
                .unwrap_or_else(|| "/dev/ttyAMA0".to_string()),
            env_port: cli
                .env_port
                .clone()
                .or(file.env_port)
                .unwrap_or_else(|| "/dev/ttyAMA2".to_string()),
            baud: cli.baud.or(file.baud).unwrap_or(115_200),
            data_dir: cli
                .data_dir
                .clone()
                .or(file.data_dir)
                .unwrap_or_else(|| PathBuf::from("./data")),
            control_port: cli.control_port.or(file.control_port),
        })
    }
}
