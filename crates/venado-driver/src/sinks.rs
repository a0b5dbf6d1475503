//! 样本分发
//!
//! 事件回调重表达为同步观察者接口：融合线程逐个调用已注册 sink，
//! 调用顺序与发出顺序一致，同一时刻最多一个样本在途。sink 回调
//! 必须有界返回，不得阻塞融合线程。

use std::sync::Arc;

use parking_lot::RwLock;
use venado_protocol::DeviceVariant;

use crate::sample::FusedSample;

/// 融合样本消费方
pub trait SampleSink: Send + Sync {
    /// 每个融合样本调用一次（融合线程上下文，按发出顺序）
    fn on_sample(&self, sample: &FusedSample);

    /// 设备连接状态变化通知
    fn on_connection_changed(&self, variant: DeviceVariant, connected: bool) {
        let _ = (variant, connected);
    }
}

/// sink 注册表
///
/// 注册可在运行期发生；分发路径只持读锁。
#[derive(Default)]
pub struct SinkRegistry {
    sinks: RwLock<Vec<Arc<dyn SampleSink>>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn SampleSink>) {
        self.sinks.write().push(sink);
    }

    pub fn dispatch(&self, sample: &FusedSample) {
        for sink in self.sinks.read().iter() {
            sink.on_sample(sample);
        }
    }

    pub fn notify_connection(&self, variant: DeviceVariant, connected: bool) {
        for sink in self.sinks.read().iter() {
            sink.on_connection_changed(variant, connected);
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }
}
