//! TCP 控制服务线程
//!
//! 监听 socket 用非阻塞 accept + 轮询运行标志，保证 stop 请求
//! 在一个轮询周期内生效；客户端一次一个（配套 App 独占链路），
//! 服务期间到达的新连接在 backlog 里排队。

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::{RecorderControl, handle_client};

/// accept 轮询间隔
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// 客户端 socket 读超时（用于轮询运行标志）
const CLIENT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// 远程控制服务句柄
pub struct ControlServer {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// 绑定地址并启动服务线程
    pub fn bind(
        addr: impl ToSocketAddrs,
        control: Arc<dyn RecorderControl>,
        data_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).context("Failed to bind control server")?;
        listener
            .set_nonblocking(true)
            .context("Failed to set listener non-blocking")?;
        let local_addr = listener.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let handle = std::thread::spawn(move || {
            serve(listener, control, data_dir, &running_clone);
        });

        info!(addr = %local_addr, "Control server listening");
        Ok(Self {
            local_addr,
            running,
            handle: Some(handle),
        })
    }

    /// 实际监听地址（绑定端口 0 时用于测试）
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 停止服务线程，幂等
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Control server thread panicked");
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(
    listener: TcpListener,
    control: Arc<dyn RecorderControl>,
    data_dir: PathBuf,
    running: &AtomicBool,
) {
    while running.load(Ordering::Acquire) {
        let (stream, peer) = match listener.accept() {
            Ok(conn) => conn,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
                std::thread::sleep(ACCEPT_POLL);
                continue;
            }
        };

        info!(peer = %peer, "Client connected");
        // accept 出来的 socket 继承了非阻塞标志，改回带超时的阻塞读
        if stream.set_nonblocking(false).is_err()
            || stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT)).is_err()
        {
            warn!(peer = %peer, "Failed to configure client socket");
            continue;
        }

        let mut stream = stream;
        match handle_client(&mut stream, control.as_ref(), &data_dir, running) {
            Ok(()) => info!(peer = %peer, "Client disconnected"),
            Err(e) => warn!(peer = %peer, error = %e, "Client connection error"),
        }
    }
    info!("Control server stopped");
}
