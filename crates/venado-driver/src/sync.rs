//! 双路融合
//!
//! 融合策略是纯函数 [`fuse`]，对两个缓冲槽和"当前时刻"做决策：
//!
//! 1. 槽的年龄 ≥ 缓冲超时视为无数据；
//! 2. 两路都无数据：不发；
//! 3. 恰有一路有数据：发部分样本，缺失侧字段取默认值；
//! 4. 两路都有但到达时刻相差超过同步窗：推迟，等下一次到达再评估
//!    （避免把一路的旧读数和另一路的新读数硬凑成一条）；
//! 5. 两路都有且在窗内：合并，时间戳取两路设备时间戳较大者。
//!
//! [`DualSynchronizer`] 把两条读取线程、事件通道和融合线程装配起来：
//! 融合线程串行消费 [`ReaderEvent`]，每个 Record 事件触发一次融合，
//! 每次最多发出一个样本给注册的 sink。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info};
use venado_protocol::{DeviceRecord, DeviceVariant};

use crate::buffer::{BufferSlot, DeviceBuffer};
use crate::config::DriverConfig;
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::reader::{DeviceReader, ReaderEvent};
use crate::sample::FusedSample;
use crate::sinks::{SampleSink, SinkRegistry};

/// 一次融合评估的结果
#[derive(Debug, Clone, PartialEq)]
pub enum FuseOutcome {
    /// 两路在窗内，合并样本
    Combined(FusedSample),
    /// 只有一路新鲜，部分样本
    Partial(FusedSample),
    /// 两路都新鲜但超出同步窗，推迟
    OutOfWindow,
    /// 两路都无新鲜数据
    NoData,
}

/// 槽内记录未超过缓冲超时才算有效
fn fresh(slot: Option<&BufferSlot>, now: Instant, timeout: Duration) -> Option<&BufferSlot> {
    slot.filter(|s| s.age(now) < timeout)
}

/// 融合策略（纯函数，无 IO、无状态）
pub fn fuse(
    gps: Option<&BufferSlot>,
    env: Option<&BufferSlot>,
    now: Instant,
    config: &DriverConfig,
) -> FuseOutcome {
    let gps = fresh(gps, now, config.buffer_timeout);
    let env = fresh(env, now, config.buffer_timeout);

    match (gps, env) {
        (None, None) => FuseOutcome::NoData,
        (Some(g), None) => FuseOutcome::Partial(build_sample(Some(g), None)),
        (None, Some(e)) => FuseOutcome::Partial(build_sample(None, Some(e))),
        (Some(g), Some(e)) => {
            let skew = if g.received_at >= e.received_at {
                g.received_at - e.received_at
            } else {
                e.received_at - g.received_at
            };
            if skew > config.sync_window {
                FuseOutcome::OutOfWindow
            } else {
                FuseOutcome::Combined(build_sample(Some(g), Some(e)))
            }
        }
    }
}

fn build_sample(gps: Option<&BufferSlot>, env: Option<&BufferSlot>) -> FusedSample {
    let gps_record = gps.and_then(|s| match &s.record {
        DeviceRecord::GpsCan(r) => Some(r),
        DeviceRecord::Env(_) => None,
    });
    let env_record = env.and_then(|s| match &s.record {
        DeviceRecord::Env(r) => Some(r),
        DeviceRecord::GpsCan(_) => None,
    });
    FusedSample::from_records(gps_record, env_record)
}

/// 双集线器同步器（对外 API）
///
/// 由 [`crate::SynchronizerBuilder`] 构建；构建即启动两条读取线程
/// 和一条融合线程。`stop`/Drop 按 读取线程 -> 事件通道 -> 融合线程
/// 的顺序关停，保证 stop 返回后不再有样本发出。
pub struct DualSynchronizer {
    readers: Vec<DeviceReader>,
    fusion_thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    sinks: Arc<SinkRegistry>,
    metrics: Arc<DriverMetrics>,
    gps_buffer: Arc<DeviceBuffer>,
    env_buffer: Arc<DeviceBuffer>,
}

impl DualSynchronizer {
    pub(crate) fn start(
        readers: Vec<DeviceReader>,
        events: Receiver<ReaderEvent>,
        gps_buffer: Arc<DeviceBuffer>,
        env_buffer: Arc<DeviceBuffer>,
        metrics: Arc<DriverMetrics>,
        config: DriverConfig,
    ) -> Self {
        let sinks = Arc::new(SinkRegistry::new());
        let running = Arc::new(AtomicBool::new(true));

        let sinks_clone = sinks.clone();
        let metrics_clone = metrics.clone();
        let running_clone = running.clone();
        let gps_clone = gps_buffer.clone();
        let env_clone = env_buffer.clone();
        let fusion_thread = std::thread::spawn(move || {
            fusion_loop(
                events,
                &gps_clone,
                &env_clone,
                &sinks_clone,
                &metrics_clone,
                &config,
                &running_clone,
            );
        });

        Self {
            readers,
            fusion_thread: Some(fusion_thread),
            running,
            sinks,
            metrics,
            gps_buffer,
            env_buffer,
        }
    }

    /// 注册一个样本消费方（可在运行期调用）
    pub fn add_sink(&self, sink: Arc<dyn SampleSink>) {
        self.sinks.register(sink);
    }

    /// 当前指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 指定设备的最新记录（若有且未被清除）
    pub fn latest(&self, variant: DeviceVariant) -> Option<DeviceRecord> {
        let buffer = match variant {
            DeviceVariant::GpsCan => &self.gps_buffer,
            DeviceVariant::Env => &self.env_buffer,
        };
        buffer.load().map(|slot| slot.record.clone())
    }

    /// 关停所有线程，幂等
    pub fn stop(&mut self) {
        // 先停读取线程：join 返回后它们的事件 Sender 也随之 drop，
        // 融合线程在通道 Disconnected 或 running 标志上退出
        for reader in &mut self.readers {
            reader.stop();
        }
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.fusion_thread.take() {
            if handle.join().is_err() {
                error!("Fusion thread panicked");
            }
        }
        info!("Synchronizer stopped");
    }
}

impl Drop for DualSynchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn buffer_for<'a>(
    variant: DeviceVariant,
    gps: &'a DeviceBuffer,
    env: &'a DeviceBuffer,
) -> &'a DeviceBuffer {
    match variant {
        DeviceVariant::GpsCan => gps,
        DeviceVariant::Env => env,
    }
}

/// 融合线程主循环：串行消费读取线程事件
fn fusion_loop(
    events: Receiver<ReaderEvent>,
    gps_buffer: &DeviceBuffer,
    env_buffer: &DeviceBuffer,
    sinks: &SinkRegistry,
    metrics: &DriverMetrics,
    config: &DriverConfig,
    running: &AtomicBool,
) {
    while running.load(Ordering::Acquire) {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(ReaderEvent::Connection { variant, connected }) => {
                // 断开时读取线程已清过缓冲；这里再清一次保证事件
                // 乱序到达（先 Record 后 Connection）时不留旧数据
                if !connected {
                    buffer_for(variant, gps_buffer, env_buffer).clear();
                }
                sinks.notify_connection(variant, connected);
            }
            Ok(ReaderEvent::Record { variant }) => {
                let now = Instant::now();
                let gps = gps_buffer.load();
                let env = env_buffer.load();
                match fuse(gps.as_deref(), env.as_deref(), now, config) {
                    FuseOutcome::Combined(sample) => {
                        metrics.samples_emitted.fetch_add(1, Ordering::Relaxed);
                        sinks.dispatch(&sample);
                    }
                    FuseOutcome::Partial(sample) => {
                        metrics.samples_emitted.fetch_add(1, Ordering::Relaxed);
                        metrics.partial_samples.fetch_add(1, Ordering::Relaxed);
                        sinks.dispatch(&sample);
                    }
                    FuseOutcome::OutOfWindow => {
                        debug!(device = ?variant, "Buffers outside sync window, deferring");
                        metrics.sync_window_misses.fetch_add(1, Ordering::Relaxed);
                    }
                    FuseOutcome::NoData => {}
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            // 所有读取线程已退出
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Fusion thread exited");
}
