//! 单会话 CSV 写入与 ZIP 归档

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use tracing::{info, warn};
use venado_driver::FusedSample;
use zip::write::SimpleFileOptions;

use crate::obd::decode_obd;

/// 每写多少行 flush 一次
const FLUSH_EVERY: u64 = 10;

/// 统一 CSV 的列定义
const CSV_HEADER: [&str; 14] = [
    "timestamp_ms",
    "gps_latitude",
    "gps_longitude",
    "gps_speed_knots",
    "gps_speed_kmh",
    "gps_fix",
    "gps_connected",
    "lidar_distance_cm",
    "lidar_distance_m",
    "lidar_strength",
    "lidar_connected",
    "co2_ppm",
    "co2_connected",
    "can_messages",
];

/// 单个录制会话
///
/// 会话 ID 为本地墙钟时间 `%Y-%m-%d_%H-%M-%S`；`finish` 把 CSV 压成
/// 同名 ZIP 并删除原文件。
pub struct SessionWriter {
    session_id: String,
    csv_path: PathBuf,
    output_dir: PathBuf,
    writer: csv::Writer<File>,
    rows_written: u64,
}

impl SessionWriter {
    /// 新建会话：创建输出目录、打开 CSV、写表头
    pub fn create(output_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create data directory {}", output_dir.display()))?;

        let session_id = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let csv_path = output_dir.join(format!("session_{session_id}.csv"));
        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(CSV_HEADER)?;

        info!(session = %session_id, path = %csv_path.display(), "Recording session started");
        Ok(Self {
            session_id,
            csv_path,
            output_dir: output_dir.to_path_buf(),
            writer,
            rows_written: 0,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// 追加一行样本
    pub fn append(&mut self, sample: &FusedSample) -> anyhow::Result<()> {
        let can_json = can_messages_json(sample);
        self.writer.write_record([
            sample.timestamp_ms.to_string(),
            sample.latitude.to_string(),
            sample.longitude.to_string(),
            sample.speed_knots.to_string(),
            sample.speed_kmh().to_string(),
            sample.gps_fix.to_string(),
            sample.gps_connected.to_string(),
            sample.distance_cm.to_string(),
            sample.distance_m().to_string(),
            sample.signal_strength.to_string(),
            sample.lidar_connected.to_string(),
            sample.co2_ppm.to_string(),
            sample.co2_connected.to_string(),
            can_json,
        ])?;

        self.rows_written += 1;
        if self.rows_written % FLUSH_EVERY == 0 {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// 结束会话：flush、压缩为 ZIP、删除 CSV
    ///
    /// 压缩失败不视为会话失败：CSV 原样保留，返回其路径。
    pub fn finish(mut self) -> anyhow::Result<PathBuf> {
        self.writer.flush()?;
        drop(self.writer);
        info!(session = %self.session_id, rows = self.rows_written, "Recording session stopped");

        let zip_path = self
            .output_dir
            .join(format!("session_{}.zip", self.session_id));
        match archive_csv(&self.csv_path, &zip_path) {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&self.csv_path) {
                    warn!(error = %e, "Failed to remove CSV after archiving");
                }
                info!(path = %zip_path.display(), "Session archive created");
                Ok(zip_path)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create session archive, keeping CSV");
                Ok(self.csv_path)
            }
        }
    }
}

/// 把单个 CSV 压入 ZIP（存档内只有文件名，不带目录）
fn archive_csv(csv_path: &Path, zip_path: &Path) -> anyhow::Result<()> {
    let name = csv_path
        .file_name()
        .and_then(|n| n.to_str())
        .context("CSV path has no valid file name")?;
    let zip_file = File::create(zip_path)?;
    let mut zip = zip::ZipWriter::new(zip_file);
    zip.start_file(name, SimpleFileOptions::default())?;
    let mut csv_file = File::open(csv_path)?;
    io::copy(&mut csv_file, &mut zip)?;
    zip.finish()?;
    Ok(())
}

/// CAN 报文列表的 JSON 表示（CSV 单列紧凑存储）
fn can_messages_json(sample: &FusedSample) -> String {
    if sample.can_entries.is_empty() {
        return "[]".to_string();
    }
    let entries: Vec<serde_json::Value> = sample
        .can_entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "id": format!("0x{:03X}", entry.id),
                "dlc": entry.dlc,
                "data": entry.payload_hex(),
                "decoded": decode_obd(entry),
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}
