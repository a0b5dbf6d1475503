//! 录制开关（sink 适配）

use std::path::{Path, PathBuf};

use anyhow::bail;
use parking_lot::Mutex;
use tracing::warn;
use venado_driver::{FusedSample, SampleSink};

use crate::archive::{ArchiveInfo, list_archives};
use crate::session::SessionWriter;

/// 可远程开关的会话录制器
///
/// 挂到同步器上作为 sink；空闲时丢弃样本，录制中逐条追加。
/// `start`/`stop` 可从任意线程调用（远程接口线程、CLI 主线程）。
pub struct Recorder {
    output_dir: PathBuf,
    session: Mutex<Option<SessionWriter>>,
}

impl Recorder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            session: Mutex::new(None),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 开始新会话，返回会话 ID
    pub fn start(&self) -> anyhow::Result<String> {
        let mut session = self.session.lock();
        if session.is_some() {
            bail!("Session already in progress");
        }
        let writer = SessionWriter::create(&self.output_dir)?;
        let id = writer.session_id().to_string();
        *session = Some(writer);
        Ok(id)
    }

    /// 结束当前会话并归档；未在录制时是 no-op
    pub fn stop(&self) -> anyhow::Result<Option<PathBuf>> {
        let taken = self.session.lock().take();
        match taken {
            Some(writer) => Ok(Some(writer.finish()?)),
            None => Ok(None),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.lock().is_some()
    }

    /// 输出目录下的会话归档（新的在前）
    pub fn archives(&self) -> anyhow::Result<Vec<ArchiveInfo>> {
        list_archives(&self.output_dir)
    }
}

impl SampleSink for Recorder {
    fn on_sample(&self, sample: &FusedSample) {
        let mut session = self.session.lock();
        if let Some(writer) = session.as_mut()
            && let Err(e) = writer.append(sample)
        {
            // 单行写失败不终止会话，丢这一条
            warn!(error = %e, "Failed to append sample to session CSV");
        }
    }
}
