//! FFmpeg process execution with progress reporting and cancellation.
//!
//! Conversions run as child processes with `-progress pipe:1` so
//! progress arrives as machine-readable key=value records on stdout.
//! Stderr is drained into a bounded tail buffer for error diagnosis.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

/// Number of stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// Errors from FFmpeg execution.
#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("FFmpeg binary not found. Please install FFmpeg.")]
    NotFound,

    #[error("ffprobe binary not found. Please install FFmpeg.")]
    ProbeNotFound,

    #[error("FFmpeg process error: {0}")]
    Io(#[from] io::Error),

    #[error("FFmpeg exited with code {exit_code}:\n{tail}")]
    Failed { exit_code: i32, tail: String },

    #[error("Conversion cancelled")]
    Cancelled,
}

/// Result type for FFmpeg operations.
pub type FfmpegResult<T> = Result<T, FfmpegError>;

/// Shared cancellation flag for in-flight conversions.
///
/// Cloneable handle; setting it causes the running process to be killed
/// at the next progress record.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Reset the flag for reuse.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Progress snapshot for a running conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    /// Completion fraction in 0.0..=1.0 (meaningful when duration known).
    pub fraction: f64,
    /// Output timestamp processed so far, in seconds.
    pub out_time_secs: f64,
    /// Total duration in seconds, if known from probing.
    pub duration_secs: Option<f64>,
    /// Encoding speed relative to realtime, if reported.
    pub speed: Option<f64>,
}

impl Progress {
    /// Completion as a whole percentage, clamped to 0..=100.
    pub fn percent(&self) -> u32 {
        (self.fraction * 100.0).clamp(0.0, 100.0) as u32
    }
}

/// Options for a single FFmpeg run.
#[derive(Default)]
pub struct RunOptions<'a> {
    /// Total input duration, used to compute progress fractions.
    pub duration_secs: Option<f64>,
    /// Cancellation flag checked while the process runs.
    pub cancel: Option<&'a CancelFlag>,
    /// Called for each progress record.
    pub on_progress: Option<&'a (dyn Fn(&Progress) + Send + Sync)>,
    /// Called for each stderr line (tool output).
    pub on_stderr_line: Option<&'a (dyn Fn(&str) + Send + Sync)>,
}

/// Resolved paths to the FFmpeg binaries.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Path to the ffmpeg binary.
    pub ffmpeg: PathBuf,
    /// Path to the ffprobe binary, if found.
    pub ffprobe: Option<PathBuf>,
}

impl Toolchain {
    /// Locate ffmpeg and ffprobe on this system.
    ///
    /// Checks PATH first, then common install locations.
    pub fn discover() -> FfmpegResult<Self> {
        let ffmpeg = find_binary("ffmpeg").ok_or(FfmpegError::NotFound)?;
        let ffprobe = find_binary("ffprobe");

        tracing::debug!(ffmpeg = %ffmpeg.display(), "FFmpeg located");
        if ffprobe.is_none() {
            tracing::warn!("ffprobe not found; media probing unavailable");
        }

        Ok(Self { ffmpeg, ffprobe })
    }

    /// Build a toolchain from explicit paths (used in tests and when the
    /// user configures a custom FFmpeg build).
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe,
        }
    }

    /// Get the ffprobe path or error if missing.
    pub fn ffprobe(&self) -> FfmpegResult<&PathBuf> {
        self.ffprobe.as_ref().ok_or(FfmpegError::ProbeNotFound)
    }

    /// Execute an FFmpeg command to completion.
    ///
    /// `args` is the argument list from [`super::build_command`]; progress
    /// flags are inserted automatically. Blocks until the process exits,
    /// is cancelled, or fails.
    pub fn execute(&self, args: &[String], opts: RunOptions<'_>) -> FfmpegResult<()> {
        let mut child = Command::new(&self.ffmpeg)
            .args(["-progress", "pipe:1", "-nostats"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let tail: Arc<Mutex<VecDeque<String>>> =
            Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));

        let mut cancelled = false;

        std::thread::scope(|scope| -> FfmpegResult<()> {
            // Drain stderr on a separate thread so the pipe never fills up.
            if let Some(stderr) = stderr {
                let tail = Arc::clone(&tail);
                let on_line = opts.on_stderr_line;
                scope.spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        if let Some(cb) = on_line {
                            cb(&line);
                        }
                        let mut buf = tail.lock();
                        if buf.len() >= STDERR_TAIL_LINES {
                            buf.pop_front();
                        }
                        buf.push_back(line);
                    }
                });
            }

            // Parse progress records from stdout on this thread.
            if let Some(stdout) = stdout {
                let mut progress = Progress {
                    duration_secs: opts.duration_secs,
                    ..Default::default()
                };

                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    if opts.cancel.is_some_and(CancelFlag::is_cancelled) {
                        let _ = child.kill();
                        cancelled = true;
                        break;
                    }

                    if let Some((key, value)) = line.split_once('=') {
                        match key {
                            "out_time_us" => {
                                if let Ok(us) = value.trim().parse::<i64>() {
                                    progress.out_time_secs = us.max(0) as f64 / 1_000_000.0;
                                    if let Some(duration) = opts.duration_secs {
                                        if duration > 0.0 {
                                            progress.fraction =
                                                (progress.out_time_secs / duration).min(1.0);
                                        }
                                    }
                                }
                            }
                            "speed" => {
                                progress.speed =
                                    value.trim().trim_end_matches('x').parse::<f64>().ok();
                            }
                            "progress" => {
                                if value.trim() == "end" {
                                    progress.fraction = 1.0;
                                }
                                if let Some(cb) = opts.on_progress {
                                    cb(&progress);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }

            Ok(())
        })?;

        let status = child.wait()?;

        if cancelled {
            tracing::info!("conversion cancelled");
            return Err(FfmpegError::Cancelled);
        }

        if !status.success() {
            let tail_lines: Vec<String> = tail.lock().iter().cloned().collect();
            return Err(FfmpegError::Failed {
                exit_code: status.code().unwrap_or(-1),
                tail: tail_lines.join("\n"),
            });
        }

        Ok(())
    }

    /// Run ffmpeg with the given args and capture stderr, without
    /// progress handling. Used for capability probing and copy tests.
    ///
    /// The process is killed if it does not exit within `deadline`;
    /// a killed run reports `timed_out` and counts as a failure.
    pub fn run_quiet(&self, args: &[&str], deadline: Duration) -> io::Result<QuietRun> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(args);

        let output = run_bounded(cmd, deadline)?;
        if output.timed_out() {
            tracing::warn!(?deadline, "ffmpeg did not exit in time; killed");
            return Ok(QuietRun {
                success: false,
                timed_out: true,
                stderr: format!("killed after {}s without exiting", deadline.as_secs()),
            });
        }

        Ok(QuietRun {
            success: output.success(),
            timed_out: false,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Capture stdout of an ffmpeg invocation (for `-formats`, `-encoders`
    /// and similar capability listings). Killed at `deadline`.
    pub fn capture_stdout(&self, args: &[&str], deadline: Duration) -> io::Result<String> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(args);

        let output = run_bounded(cmd, deadline)?;
        if output.timed_out() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "ffmpeg listing did not finish in time",
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Outcome of a quiet probing run.
#[derive(Debug, Clone)]
pub struct QuietRun {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Whether the process was killed at the deadline.
    pub timed_out: bool,
    /// Captured stderr (or a kill notice on timeout).
    pub stderr: String,
}

/// Output of a deadline-bounded child process run.
pub(crate) struct BoundedOutput {
    /// Exit status, or `None` when the process was killed at the deadline.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl BoundedOutput {
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }
}

/// Poll interval while waiting on a bounded child process.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Run a child process, collecting stdout and stderr, killing it if it
/// has not exited when `deadline` elapses.
///
/// FFmpeg and ffprobe can wedge on broken hardware contexts or
/// pathological inputs; every short probing run goes through this so a
/// stuck child never hangs the caller.
pub(crate) fn run_bounded(mut cmd: Command, deadline: Duration) -> io::Result<BoundedOutput> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    std::thread::scope(|scope| -> io::Result<BoundedOutput> {
        // Drain both pipes on their own threads so a full pipe never
        // deadlocks against the wait loop.
        let out_handle = stdout.map(|mut pipe| {
            scope.spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        let err_handle = stderr.map(|mut pipe| {
            scope.spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(e) => {
                    // Kill before returning so the reader threads unblock
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e);
                }
            }
            if started.elapsed() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            std::thread::sleep(WAIT_POLL);
        };

        Ok(BoundedOutput {
            status,
            stdout: out_handle
                .map(|h| h.join().unwrap_or_default())
                .unwrap_or_default(),
            stderr: err_handle
                .map(|h| h.join().unwrap_or_default())
                .unwrap_or_default(),
        })
    })
}

/// Find a binary on PATH or in common install locations.
fn find_binary(name: &str) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &["C:\\ffmpeg\\bin", "C:\\Program Files\\ffmpeg\\bin"]
    } else if cfg!(target_os = "macos") {
        &["/opt/homebrew/bin", "/usr/local/bin", "/opt/local/bin"]
    } else {
        &["/usr/bin", "/usr/local/bin", "/snap/bin"]
    };

    let file_name = if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    };

    for dir in candidates {
        let path = PathBuf::from(dir).join(&file_name);
        if path.is_file() {
            return Some(path);
        }
    }

    None
}

/// Render an argument list as a shell-like string for logging.
pub fn render_command(binary: &str, args: &[String]) -> String {
    let mut out = String::from(binary);
    for arg in args {
        out.push(' ');
        if arg.contains(' ') {
            out.push('"');
            out.push_str(arg);
            out.push('"');
        } else {
            out.push_str(arg);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_round_trip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());

        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());

        flag.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn progress_percent_clamps() {
        let p = Progress {
            fraction: 0.5,
            ..Default::default()
        };
        assert_eq!(p.percent(), 50);

        let p = Progress {
            fraction: 1.2,
            ..Default::default()
        };
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn render_command_quotes_spaces() {
        let args = vec!["-i".to_string(), "my file.mkv".to_string()];
        assert_eq!(render_command("ffmpeg", &args), "ffmpeg -i \"my file.mkv\"");
    }

    #[test]
    fn execute_reports_spawn_failure() {
        let toolchain = Toolchain::with_paths("/nonexistent/ffmpeg-binary", None);
        let result = toolchain.execute(&["-version".to_string()], RunOptions::default());
        assert!(matches!(result, Err(FfmpegError::Io(_))));
    }

    #[test]
    #[cfg(unix)]
    fn run_quiet_kills_hung_process_at_deadline() {
        // Stand in a sleeping process for a wedged ffmpeg run.
        let toolchain = Toolchain::with_paths("/bin/sleep", None);
        let started = Instant::now();

        let run = toolchain
            .run_quiet(&["30"], Duration::from_millis(200))
            .unwrap();

        assert!(!run.success);
        assert!(run.timed_out);
        assert!(run.stderr.contains("killed"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    #[cfg(unix)]
    fn capture_stdout_times_out_with_error() {
        let toolchain = Toolchain::with_paths("/bin/sleep", None);
        let result = toolchain.capture_stdout(&["30"], Duration::from_millis(200));
        assert!(matches!(result, Err(e) if e.kind() == io::ErrorKind::TimedOut));
    }

    #[test]
    fn bounded_run_completes_before_deadline() {
        let toolchain = Toolchain::with_paths("/nonexistent/ffmpeg-binary", None);
        // Spawn failure surfaces as Err, not as a timeout
        assert!(toolchain
            .run_quiet(&["-version"], Duration::from_secs(1))
            .is_err());
    }

    #[test]
    fn missing_ffprobe_is_an_error() {
        let toolchain = Toolchain::with_paths("ffmpeg", None);
        assert!(matches!(
            toolchain.ffprobe(),
            Err(FfmpegError::ProbeNotFound)
        ));
    }
}
