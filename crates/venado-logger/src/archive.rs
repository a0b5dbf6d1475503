//! 会话归档列举

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;

/// 一个会话归档的元数据（远程接口以 JSON 数组下发）
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInfo {
    pub filename: String,
    pub size_bytes: u64,
    /// 修改时间，本地时区 ISO-8601
    pub date: String,
}

/// 列出目录下的 `.zip` 归档，按日期新的在前
///
/// 目录不存在视为空列表（录制从未发生过）。
pub fn list_archives(dir: &Path) -> anyhow::Result<Vec<ArchiveInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut archives = Vec::new();
    for entry in dir
        .read_dir()
        .with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("zip") {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let meta = entry.metadata()?;
        let modified: DateTime<Local> = meta.modified()?.into();
        archives.push(ArchiveInfo {
            filename: filename.to_string(),
            size_bytes: meta.len(),
            date: modified.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        });
    }
    archives.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_list_skips_non_zip_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("session_a.zip"), b"aa").unwrap();
        fs::write(dir.path().join("session_b.zip"), b"bbbb").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let archives = list_archives(dir.path()).unwrap();
        assert_eq!(archives.len(), 2);
        assert!(archives.iter().all(|a| a.filename.ends_with(".zip")));
        // 新的在前
        assert!(archives[0].date >= archives[1].date);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_archives(&missing).unwrap().is_empty());
    }
}
