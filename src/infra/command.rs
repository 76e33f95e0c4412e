//! # Process Runner Module / 进程运行模块
//!
//! Every external invocation (compiler, linter, simulator, synthesizer and the
//! student's own program) goes through [`run`]. Each child is placed in its own
//! process group so that a timeout, a cancellation or a stray background
//! grandchild can be torn down as a whole.
//!
//! 每个外部调用（编译器、检查器、仿真器、综合工具以及学生程序本身）都通过 [`run`] 执行。
//! 每个子进程都被放入独立的进程组，以便超时、取消或残留的后台孙进程可以被整体终止。

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Appended to a stream whose output exceeded the capture cap.
pub const TRUNCATION_MARKER: &str = "\n[... output truncated ...]\n";

/// How long reader tasks may keep draining after the process group is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// A fully described external command.
/// 一个完整描述的外部命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
    pub env: Vec<(OsString, OsString)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: Option<String>) -> Self {
        self.stdin = input;
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// The command line, shell-quoted, for logs and diagnostics.
    pub fn display(&self) -> String {
        let words: Vec<String> = std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|w| w.to_string_lossy().into_owned())
            .collect();
        shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
    }
}

/// Everything observed about one finished invocation.
/// 一次已完成调用的所有观察结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// Terminating signal, on Unix.
    pub signal: Option<i32>,
    pub elapsed: Duration,
    pub timed_out: bool,
    pub cancelled: bool,
    /// At least one stream was cut at the capture cap.
    pub truncated: bool,
}

impl RawRunResult {
    pub fn success(&self) -> bool {
        !self.timed_out && !self.cancelled && self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, as a single diagnostic text.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let mut text = self.stdout.clone();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&self.stderr);
                text
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("executable not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to start {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bytes captured from one stream, bounded by the cap.
#[derive(Debug)]
struct Captured {
    bytes: Vec<u8>,
    cap: usize,
    dropped: bool,
}

impl Captured {
    fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
            dropped: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.dropped = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn finish(&self) -> (String, bool) {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped {
            text.push_str(TRUNCATION_MARKER);
        }
        (text, self.dropped)
    }
}

enum Ending {
    Exited,
    TimedOut,
    Cancelled,
}

/// Runs an invocation to completion, timeout or cancellation.
///
/// Timeouts and cancellation are not errors: they return a result with
/// `timed_out`/`cancelled` set and whatever output was captured. In every case
/// the child's process group is killed before returning, so nothing the
/// invocation started outlives the call.
///
/// 运行一个调用直到完成、超时或取消。超时和取消不是错误。
/// 在所有情况下，返回前都会终止子进程的进程组。
pub async fn run(
    invocation: &Invocation,
    timeout: Option<Duration>,
    cap: usize,
    cancel: &CancellationToken,
) -> Result<RawRunResult, SpawnError> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in &invocation.env {
        cmd.env(key, value);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    debug!(command = %invocation.display(), "Spawning process");
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SpawnError::NotFound(invocation.program.clone())
        } else {
            SpawnError::Io {
                program: invocation.program.display().to_string(),
                source,
            }
        }
    })?;
    let pid = child.id();

    let stdin_task = match (child.stdin.take(), invocation.stdin.clone()) {
        (Some(mut writer), Some(input)) => Some(tokio::spawn(async move {
            // A child that exits without reading its input closes the pipe.
            let _ = writer.write_all(input.as_bytes()).await;
            let _ = writer.shutdown().await;
        })),
        _ => None,
    };

    let stdout_sink = Arc::new(Mutex::new(Captured::new(cap)));
    let stderr_sink = Arc::new(Mutex::new(Captured::new(cap)));
    let readers = [
        child
            .stdout
            .take()
            .map(|r| tokio::spawn(pump(r, Arc::clone(&stdout_sink)))),
        child
            .stderr
            .take()
            .map(|r| tokio::spawn(pump(r, Arc::clone(&stderr_sink)))),
    ];

    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let ending = tokio::select! {
        _ = leader_exited(&mut child) => Ending::Exited,
        _ = deadline => Ending::TimedOut,
        _ = cancel.cancelled() => Ending::Cancelled,
    };

    // The group outlives its leader when the program forked into the background.
    // The leader is not reaped yet, so its pid still names this group.
    kill_group(pid);
    let (status, timed_out, cancelled) = match ending {
        Ending::Exited => (child.wait().await.ok(), false, false),
        Ending::TimedOut => (reap(&mut child).await, true, false),
        Ending::Cancelled => (reap(&mut child).await, false, true),
    };
    let elapsed = start.elapsed();

    for reader in readers.into_iter().flatten() {
        let abort = reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            abort.abort();
        }
    }
    if let Some(task) = stdin_task {
        task.abort();
    }

    let (stdout, stdout_cut) = stdout_sink.lock().await.finish();
    let (stderr, stderr_cut) = stderr_sink.lock().await.finish();

    let exit_code = status.and_then(|s| s.code());
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.and_then(|s| s.signal())
    };
    #[cfg(not(unix))]
    let signal = None;

    debug!(
        command = %invocation.display(),
        ?exit_code,
        ?signal,
        timed_out,
        cancelled,
        elapsed_ms = elapsed.as_millis() as u64,
        "Process finished"
    );

    Ok(RawRunResult {
        stdout,
        stderr,
        exit_code,
        signal,
        elapsed,
        timed_out,
        cancelled,
        truncated: stdout_cut || stderr_cut,
    })
}

/// Resolves once the group leader has exited, leaving it unreaped.
#[cfg(unix)]
async fn leader_exited(child: &mut tokio::process::Child) {
    let Some(pid) = child.id().and_then(|p| libc::id_t::try_from(p).ok()) else {
        return;
    };
    let waited = tokio::task::spawn_blocking(move || {
        loop {
            // SAFETY: siginfo_t is plain data; WNOWAIT leaves the zombie in place
            // for the later `wait`.
            let rc = unsafe {
                let mut info: libc::siginfo_t = std::mem::zeroed();
                libc::waitid(libc::P_PID, pid, &mut info, libc::WEXITED | libc::WNOWAIT)
            };
            if rc == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
                break;
            }
        }
    })
    .await;
    if let Err(e) = waited {
        debug!(error = %e, "Exit watcher failed");
    }
}

#[cfg(not(unix))]
async fn leader_exited(child: &mut tokio::process::Child) {
    let _ = child.wait().await;
}

async fn reap(child: &mut tokio::process::Child) -> Option<ExitStatus> {
    let _ = child.start_kill();
    child.wait().await.ok()
}

/// Reads a stream to its end, keeping at most `cap` bytes. Reading continues
/// past the cap so the child never blocks on a full pipe.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: Arc<Mutex<Captured>>) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.lock().await.push(&buf[..n]),
        }
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    if let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) {
        // SAFETY: killpg only delivers a signal; a group that no longer exists
        // yields ESRCH, which is ignored.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Cuts `text` to at most `cap` bytes on a character boundary, appending the
/// truncation marker when anything was removed.
pub fn cap_text(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}
