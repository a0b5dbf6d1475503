//! # Venado CLI
//!
//! 无头数据记录守护进程：连接两台遥测集线器，持续融合样本，
//! 可选地录制 CSV/ZIP 会话并暴露远程控制端口。
//!
//! ```bash
//! # 真实硬件，立即开始录制，10 分钟后自动停止
//! venado --record --duration 600
//!
//! # 无硬件冒烟（仿真集线器）+ 远程控制端口
//! venado --mock --control-port 3333
//! ```
//!
//! Ctrl+C / SIGTERM 触发有序关停：先停远程服务，再归档当前会话，
//! 最后停读取与融合线程。

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

mod control;
mod settings;

use control::CliControl;
use settings::Settings;
use venado_driver::SynchronizerBuilder;
use venado_logger::Recorder;
use venado_protocol::DeviceVariant;
use venado_remote::ControlServer;
use venado_serial::mock::SimConnector;

/// Venado headless datalogger
#[derive(Parser, Debug)]
#[command(name = "venado")]
#[command(about = "Headless dual-hub telemetry datalogger", long_about = None)]
#[command(version)]
struct Cli {
    /// GPS+CAN 集线器串口
    #[arg(long)]
    gps_port: Option<String>,

    /// Lidar+CO2 集线器串口
    #[arg(long)]
    env_port: Option<String>,

    /// 波特率
    #[arg(long)]
    baud: Option<u32>,

    /// 使用仿真集线器（无硬件）
    #[arg(long)]
    mock: bool,

    /// 启动即开始录制
    #[arg(long)]
    record: bool,

    /// 运行时长（秒），0 表示一直运行
    #[arg(long, default_value_t = 0)]
    duration: u64,

    /// 会话输出目录
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 远程控制 TCP 端口（不给则不启用）
    #[arg(long)]
    control_port: Option<u16>,

    /// TOML 配置文件（命令行参数优先）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("venado={default_level}").parse().unwrap())
                .add_directive(format!("venado_cli={default_level}").parse().unwrap()),
        )
        .init();

    let settings = Settings::resolve(&cli)?;
    info!(
        gps_port = %settings.gps_port,
        env_port = %settings.env_port,
        baud = settings.baud,
        data_dir = %settings.data_dir.display(),
        mock = cli.mock,
        "Starting datalogger"
    );

    // 录制器先建好：远程接口和本地 --record 共用同一个
    let recorder = Arc::new(Recorder::new(settings.data_dir.clone()));

    let mut builder = SynchronizerBuilder::new()
        .gps_port(settings.gps_port.clone())
        .env_port(settings.env_port.clone())
        .baud_rate(settings.baud);
    if cli.mock {
        info!("Using simulated hubs");
        builder = builder
            .gps_connector(Box::new(SimConnector::new(DeviceVariant::GpsCan)))
            .env_connector(Box::new(SimConnector::new(DeviceVariant::Env)));
    }
    let mut synchronizer = builder.build().context("Failed to start synchronizer")?;
    synchronizer.add_sink(recorder.clone());

    let mut control_server = match settings.control_port {
        Some(port) => {
            let server = ControlServer::bind(
                ("0.0.0.0", port),
                Arc::new(CliControl::new(recorder.clone())),
                settings.data_dir.clone(),
            )?;
            Some(server)
        }
        None => None,
    };

    if cli.record {
        let session_id = recorder.start().context("Failed to start recording")?;
        info!(session = %session_id, "Recording started");
    }

    // Ctrl+C / SIGTERM
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        running_clone.store(false, Ordering::Release);
    })
    .context("Failed to install signal handler")?;

    run_until_done(&running, cli.duration, &synchronizer, &recorder);

    // 有序关停
    if let Some(server) = control_server.as_mut() {
        server.stop();
    }
    match recorder.stop() {
        Ok(Some(archive)) => info!(path = %archive.display(), "Session archived"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to finalize session"),
    }
    synchronizer.stop();

    let metrics = synchronizer.metrics();
    info!(
        samples = metrics.samples_emitted,
        frames = metrics.frames_decoded,
        decode_failures = metrics.decode_failures,
        "Datalogger stopped"
    );
    Ok(())
}

/// 主循环：每秒醒一次，十秒一条状态行，处理时长上限
fn run_until_done(
    running: &AtomicBool,
    duration_secs: u64,
    synchronizer: &venado_driver::DualSynchronizer,
    recorder: &Recorder,
) {
    let started = Instant::now();
    let deadline = (duration_secs > 0).then(|| started + Duration::from_secs(duration_secs));
    if deadline.is_some() {
        info!(seconds = duration_secs, "Will stop automatically");
    }

    let mut last_status = 0;
    while running.load(Ordering::Acquire) {
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            info!(seconds = duration_secs, "Duration elapsed");
            break;
        }

        let elapsed = started.elapsed().as_secs();
        if elapsed > 0 && elapsed % 10 == 0 && elapsed != last_status {
            last_status = elapsed;
            let m = synchronizer.metrics();
            info!(
                uptime_s = elapsed,
                samples = m.samples_emitted,
                partial = m.partial_samples,
                decode_failures = m.decode_failures,
                recording = recorder.is_recording(),
                "Status"
            );
        }

        std::thread::sleep(Duration::from_secs(1));
    }
}
