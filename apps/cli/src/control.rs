//! 远程控制面适配

use std::sync::Arc;

use venado_logger::Recorder;
use venado_remote::RecorderControl;

/// 把进程内的 [`Recorder`] 暴露给远程控制服务
pub struct CliControl {
    recorder: Arc<Recorder>,
}

impl CliControl {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}

impl RecorderControl for CliControl {
    fn start_recording(&self) -> anyhow::Result<()> {
        self.recorder.start().map(|_| ())
    }

    fn stop_recording(&self) -> anyhow::Result<()> {
        self.recorder.stop().map(|_| ())
    }

    fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }
}
