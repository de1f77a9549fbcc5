// src/system/executor.rs

use colored::{Color, Colorize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{program}' could not be executed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Lost track of '{program}' while it was running: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Operation was interrupted by the user.")]
    Interrupted,
}

/// How the child's standard streams are connected.
#[derive(Debug, Clone)]
pub enum StdioMode {
    /// stdin, stdout and stderr are the terminal's.
    Inherit,
    /// stdin is closed; every stdout/stderr line is re-printed behind `[tag]` in `color`.
    Capture { tag: String, color: Color },
}

/// Everything needed to start one process. Arguments are passed as-is, never
/// through a shell command line.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Overlaid on top of the current process environment.
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub stdio: StdioMode,
}

impl LaunchSpec {
    /// A copy-pasteable shell rendering, for logs.
    pub fn command_line(&self) -> String {
        let program = self.program.display().to_string();
        self.env
            .iter()
            .map(|(k, v)| format!("{}={}", k, quote(v)))
            .chain(std::iter::once(quote(&program)))
            .chain(self.args.iter().map(|a| quote(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| format!("{:?}", value))
}

/// The colored `[tag]` prefix put in front of captured lines.
pub fn line_prefix(tag: &str, color: Color) -> String {
    format!("[{}]", tag).color(color).to_string()
}

/// Runs a process to completion and returns its exit code. A process killed by a
/// signal reports `128 + signal`.
///
/// Ctrl+C while the process runs kills it and returns `ExecutionError::Interrupted`.
pub async fn launch(spec: &LaunchSpec) -> Result<i32, ExecutionError> {
    let program = spec.program.display().to_string();
    log::debug!("Launching: {}", spec.command_line());

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).envs(&spec.env).kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(dunce::simplified(cwd));
    }
    match spec.stdio {
        StdioMode::Inherit => {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
        StdioMode::Capture { .. } => {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
    }

    let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
        program: program.clone(),
        source,
    })?;

    let finished = tokio::select! {
        status = wait_streaming(&mut child, &spec.stdio) => Some(status),
        _ = tokio::signal::ctrl_c() => None,
    };

    match finished {
        Some(status) => {
            let status = status.map_err(|source| ExecutionError::Wait { program, source })?;
            Ok(exit_code(status))
        }
        None => {
            log::debug!("Ctrl+C received, killing '{}' (PID {:?}).", program, child.id());
            if let Err(e) = child.start_kill() {
                log::warn!("Failed to kill child process {:?}: {}", child.id(), e);
            }
            child.wait().await.ok();
            Err(ExecutionError::Interrupted)
        }
    }
}

/// Drains both captured streams (if any) and then reaps the child.
async fn wait_streaming(child: &mut Child, stdio: &StdioMode) -> io::Result<ExitStatus> {
    if let StdioMode::Capture { tag, color } = stdio {
        let prefix = line_prefix(tag, *color);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            pump(stdout, &prefix, Target::Stdout),
            pump(stderr, &prefix, Target::Stderr)
        );
    }
    child.wait().await
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Stdout,
    Stderr,
}

/// Re-emits a stream line by line. Lines of one stream keep their order; invalid UTF-8
/// is replaced rather than dropped.
async fn pump<R: AsyncRead + Unpin>(reader: Option<R>, prefix: &str, target: Target) {
    let Some(reader) = reader else {
        return;
    };
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                // A closed terminal is not a reason to stop draining the child.
                let _ = match target {
                    Target::Stdout => writeln!(io::stdout().lock(), "{} {}", prefix, line),
                    Target::Stderr => writeln!(io::stderr().lock(), "{} {}", prefix, line),
                };
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
