//! # Venado Remote
//!
//! 行协议远程控制服务：配套 App 通过无线串行链路（蓝牙 SPP 或
//! TCP 桥接）远程开关录制、查询状态、列举和下载会话归档。
//!
//! 命令集（一行一命令，动词不区分大小写）：
//!
//! ```text
//! START_DATALOGGER   开始录制            -> OK / ERROR: ...
//! STOP_DATALOGGER    停止录制并归档       -> OK / ERROR: ...
//! GET_STATUS         查询状态            -> RUNNING / STOPPED
//! LIST_CSV           列举归档            -> JSON 数组
//! GET_CSV <name>     下载归档            -> SIZE:<n> / 数据 / OK
//! ```
//!
//! 文件传输握手：服务端发 `SIZE:<字节数>\n`，客户端回 4 字节
//! `ACK`，随后按 4096 字节块传输，末尾补一行 `OK`。
//!
//! 命令处理对流类型泛型（`Read + Write`），单元测试用内存流驱动，
//! [`ControlServer`] 在 TCP 上跑同一套处理逻辑。

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

pub mod server;
pub use server::ControlServer;

/// 传输块大小
pub const CHUNK_SIZE: usize = 4096;

/// 单条命令行的长度上限
const MAX_LINE_LEN: usize = 1024;

/// 录制生命周期的远程可控面
///
/// 由宿主进程实现（通常是 CLI 对 `venado_logger::Recorder` 的薄封装），
/// 实现必须线程安全：命令来自服务线程，样本写入来自融合线程。
pub trait RecorderControl: Send + Sync {
    fn start_recording(&self) -> anyhow::Result<()>;
    fn stop_recording(&self) -> anyhow::Result<()>;
    fn is_recording(&self) -> bool;
}

/// 处理一条客户端连接上的命令流
///
/// 一行一命令；对端关闭或 `running` 置 false 时返回。GET_CSV 的
/// ACK 握手字节不算命令行，由传输逻辑单独消费。
pub fn handle_client<S: Read + Write>(
    stream: &mut S,
    control: &dyn RecorderControl,
    data_dir: &Path,
    running: &AtomicBool,
) -> std::io::Result<()> {
    loop {
        let Some(line) = read_line(stream, running)? else {
            return Ok(());
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        debug!(command, "Remote command received");
        process_command(stream, command, control, data_dir, running)?;
    }
}

/// 读一行（不含换行符）；对端关闭或停机返回 `None`
///
/// 读超时（服务端给客户端 socket 设了超时）只用来轮询 `running`，
/// 不视为错误。
fn read_line<S: Read>(stream: &mut S, running: &AtomicBool) -> std::io::Result<Option<String>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if !running.load(Ordering::Acquire) {
            return Ok(None);
        }
        match stream.read(&mut byte) {
            Ok(0) => {
                if line.is_empty() {
                    return Ok(None);
                }
                break;
            }
            Ok(_) => {
                if byte[0] == b'\n' {
                    break;
                }
                line.push(byte[0]);
                if line.len() >= MAX_LINE_LEN {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Some(String::from_utf8_lossy(&line).to_string()))
}

/// 处理单条命令并写回响应
fn process_command<S: Read + Write>(
    stream: &mut S,
    command: &str,
    control: &dyn RecorderControl,
    data_dir: &Path,
    running: &AtomicBool,
) -> std::io::Result<()> {
    let mut parts = command.splitn(2, ' ');
    let verb = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().map(str::trim);

    let response = match verb.as_str() {
        "START_DATALOGGER" => {
            if control.is_recording() {
                "ERROR: Datalogger already running".to_string()
            } else {
                match control.start_recording() {
                    Ok(()) => {
                        info!("Recording started remotely");
                        "OK".to_string()
                    }
                    Err(e) => format!("ERROR: {e}"),
                }
            }
        }
        "STOP_DATALOGGER" => {
            if !control.is_recording() {
                "ERROR: Datalogger not running".to_string()
            } else {
                match control.stop_recording() {
                    Ok(()) => {
                        info!("Recording stopped remotely");
                        "OK".to_string()
                    }
                    Err(e) => format!("ERROR: {e}"),
                }
            }
        }
        "GET_STATUS" => {
            if control.is_recording() {
                "RUNNING".to_string()
            } else {
                "STOPPED".to_string()
            }
        }
        "LIST_CSV" => match venado_logger::list_archives(data_dir) {
            Ok(archives) => {
                serde_json::to_string(&archives).unwrap_or_else(|e| format!("ERROR: {e}"))
            }
            Err(e) => format!("ERROR: {e}"),
        },
        "GET_CSV" => match arg {
            None | Some("") => "ERROR: Missing filename".to_string(),
            Some(name) => send_archive(stream, name, data_dir, running)?,
        },
        _ => format!("ERROR: Unknown command '{command}'"),
    };

    stream.write_all(response.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()
}

/// GET_CSV 的文件传输：SIZE 头、ACK 握手、分块发送
///
/// 返回的字符串是传输完成（或失败）后补发的状态行。
fn send_archive<S: Read + Write>(
    stream: &mut S,
    name: &str,
    data_dir: &Path,
    running: &AtomicBool,
) -> std::io::Result<String> {
    // 纯文件名，拒绝任何目录穿越
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Ok(format!("ERROR: Invalid filename: {name}"));
    }
    // 不带扩展名时按会话 ID 处理
    let filename = if name.ends_with(".zip") {
        name.to_string()
    } else {
        format!("session_{name}.zip")
    };
    let path = data_dir.join(&filename);
    if !path.is_file() {
        return Ok(format!("ERROR: File not found: {filename}"));
    }

    let size = match path.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => return Ok(format!("ERROR: {e}")),
    };
    stream.write_all(format!("SIZE:{size}\n").as_bytes())?;
    stream.flush()?;

    // 等客户端确认：读超时和 read_line 一样只用来轮询运行标志
    let mut ack = [0u8; 4];
    let n = loop {
        if !running.load(Ordering::Acquire) {
            return Ok("ERROR: Transfer aborted".to_string());
        }
        match stream.read(&mut ack) {
            Ok(n) => break n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    };
    if String::from_utf8_lossy(&ack[..n]).trim() != "ACK" {
        return Ok("ERROR: Client did not acknowledge".to_string());
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) => return Ok(format!("ERROR: {e}")),
    };
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        stream.write_all(&chunk[..n])?;
        sent += n as u64;
    }
    stream.flush()?;
    info!(file = %filename, bytes = sent, "Archive sent");
    if sent != size {
        warn!(expected = size, actual = sent, "Archive size changed during transfer");
    }
    Ok("OK".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 内存双工流：预排的输入 + 捕获的输出
    struct FakeStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl FakeStream {
        fn new(input: impl Into<Vec<u8>>) -> Self {
            Self {
                input: Cursor::new(input.into()),
                output: Vec::new(),
            }
        }

        fn output_str(&self) -> String {
            String::from_utf8_lossy(&self.output).to_string()
        }
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// 按脚本出数据的流：`Stall` 模拟一次 socket 读超时
    enum ReadStep {
        Data(Vec<u8>),
        Stall,
    }

    struct ScriptedStream {
        steps: std::collections::VecDeque<ReadStep>,
        output: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(steps: impl IntoIterator<Item = ReadStep>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                output: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(ReadStep::Stall) => {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout"))
                }
                Some(ReadStep::Data(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.steps.push_front(ReadStep::Data(bytes[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRecorder {
        recording: AtomicBool,
        fail_start: bool,
    }

    impl RecorderControl for FakeRecorder {
        fn start_recording(&self) -> anyhow::Result<()> {
            if self.fail_start {
                anyhow::bail!("disk full");
            }
            self.recording.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop_recording(&self) -> anyhow::Result<()> {
            self.recording.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_recording(&self) -> bool {
            self.recording.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_start_stop_status_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FakeRecorder::default();
        let mut stream = FakeStream::new(
            "GET_STATUS\nSTART_DATALOGGER\nGET_STATUS\nSTOP_DATALOGGER\nGET_STATUS\n",
        );
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();
        assert_eq!(
            stream.output_str(),
            "STOPPED\nOK\nRUNNING\nOK\nSTOPPED\n"
        );
    }

    #[test]
    fn test_double_start_and_spurious_stop() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FakeRecorder::default();
        let mut stream = FakeStream::new("STOP_DATALOGGER\nSTART_DATALOGGER\nSTART_DATALOGGER\n");
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();
        assert_eq!(
            stream.output_str(),
            "ERROR: Datalogger not running\nOK\nERROR: Datalogger already running\n"
        );
    }

    #[test]
    fn test_start_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FakeRecorder {
            fail_start: true,
            ..Default::default()
        };
        let mut stream = FakeStream::new("START_DATALOGGER\n");
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();
        assert_eq!(stream.output_str(), "ERROR: disk full\n");
    }

    #[test]
    fn test_verb_is_case_insensitive_and_unknown_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FakeRecorder::default();
        let mut stream = FakeStream::new("get_status\nFLY_TO_MOON\n");
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();
        assert_eq!(
            stream.output_str(),
            "STOPPED\nERROR: Unknown command 'FLY_TO_MOON'\n"
        );
    }

    #[test]
    fn test_list_csv_returns_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session_x.zip"), b"zipzip").unwrap();
        let recorder = FakeRecorder::default();
        let mut stream = FakeStream::new("LIST_CSV\n");
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();

        let out = stream.output_str();
        let json: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(json[0]["filename"], "session_x.zip");
        assert_eq!(json[0]["size_bytes"], 6);
    }

    #[test]
    fn test_get_csv_transfers_file() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"fake zip bytes".to_vec();
        std::fs::write(dir.path().join("session_2025.zip"), &payload).unwrap();
        let recorder = FakeRecorder::default();

        // 会话 ID 形式（无 .zip 后缀），输入流里预排好 ACK
        let mut stream = FakeStream::new(b"GET_CSV 2025\nACK".to_vec());
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();

        let mut expected = format!("SIZE:{}\n", payload.len()).into_bytes();
        expected.extend_from_slice(&payload);
        expected.extend_from_slice(b"OK\n");
        assert_eq!(stream.output, expected);
    }

    #[test]
    fn test_get_csv_waits_through_ack_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"slow client".to_vec();
        std::fs::write(dir.path().join("session_slow.zip"), &payload).unwrap();
        let recorder = FakeRecorder::default();

        // ACK 前先超时一次：传输必须照常完成而不是断开
        let mut stream = ScriptedStream::new([
            ReadStep::Data(b"GET_CSV slow\n".to_vec()),
            ReadStep::Stall,
            ReadStep::Data(b"ACK".to_vec()),
        ]);
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();

        let mut expected = format!("SIZE:{}\n", payload.len()).into_bytes();
        expected.extend_from_slice(&payload);
        expected.extend_from_slice(b"OK\n");
        assert_eq!(stream.output, expected);
    }

    #[test]
    fn test_get_csv_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FakeRecorder::default();
        let mut stream = FakeStream::new("GET_CSV ../etc/passwd\nGET_CSV nope\nGET_CSV\n");
        handle_client(&mut stream, &recorder, dir.path(), &AtomicBool::new(true)).unwrap();
        assert_eq!(
            stream.output_str(),
            "ERROR: Invalid filename: ../etc/passwd\nERROR: File not found: session_nope.zip\nERROR: Missing filename\n"
        );
    }
}
