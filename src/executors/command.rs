//! # External process execution.
//!
//! [`Command`] spawns an OS process bound to the context's lifetime: when the context is
//! cancelled the child is killed and the context error is returned. A non-zero exit is
//! reported as [`Error::Command`].
//!
//! Standard streams are configured per stream: inherited (default), discarded, or, for
//! stdout/stderr, captured into a shared [`Buffer`]. Stdin may be fed from fixed bytes.
//!
//! ## Example
//! ```rust,no_run
//! use routine::{Buffer, Command, Context, Executor, Output};
//!
//! # async fn demo() -> Result<(), routine::Error> {
//! let out = Buffer::new();
//! let cmd = Command::new("uname").arg("-a").stdout(Output::Capture(out.clone()));
//! cmd.execute(Context::new()).await?;
//! println!("{}", out.to_string_lossy());
//! # Ok(())
//! # }
//! ```

use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command as OsCommand};

use crate::context::Context;
use crate::error::Error;
use crate::executors::Executor;

/// Shared, growable capture buffer.
#[derive(Clone, Debug, Default)]
pub struct Buffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Buffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the captured bytes.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Captured bytes as (lossy) UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Discards the captured bytes.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn append(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stdin source.
#[derive(Clone, Debug, Default)]
pub enum Input {
    /// Inherit the parent's stdin.
    #[default]
    Inherit,
    /// Empty stdin.
    Null,
    /// Feed these bytes, then close stdin.
    Bytes(Arc<[u8]>),
}

/// Stdout/stderr destination.
#[derive(Clone, Debug, Default)]
pub enum Output {
    /// Inherit the parent's stream.
    #[default]
    Inherit,
    /// Discard.
    Null,
    /// Append everything into the buffer.
    Capture(Buffer),
}

impl Output {
    fn stdio(&self) -> Stdio {
        match self {
            Output::Inherit => Stdio::inherit(),
            Output::Null => Stdio::null(),
            Output::Capture(_) => Stdio::piped(),
        }
    }

    fn buffer(&self) -> Option<&Buffer> {
        match self {
            Output::Capture(buf) => Some(buf),
            _ => None,
        }
    }
}

/// Runs an external program.
#[derive(Clone, Debug)]
pub struct Command {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    env_clear: bool,
    stdin: Input,
    stdout: Output,
    stderr: Output,
}

impl Command {
    /// Creates a command for `program` with inherited environment and streams.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            env_clear: false,
            stdin: Input::Inherit,
            stdout: Output::Inherit,
            stderr: Output::Inherit,
        }
    }

    /// Adds one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets one environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Starts from an empty environment instead of the inherited one.
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// Configures stdin.
    pub fn stdin(mut self, input: Input) -> Self {
        self.stdin = input;
        self
    }

    /// Configures stdout.
    pub fn stdout(mut self, output: Output) -> Self {
        self.stdout = output;
        self
    }

    /// Configures stderr.
    pub fn stderr(mut self, output: Output) -> Self {
        self.stderr = output;
        self
    }

    fn build(&self) -> OsCommand {
        let mut cmd = OsCommand::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if self.env_clear {
            cmd.env_clear();
        }
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(match self.stdin {
            Input::Inherit => Stdio::inherit(),
            Input::Null => Stdio::null(),
            Input::Bytes(_) => Stdio::piped(),
        });
        cmd.stdout(self.stdout.stdio());
        cmd.stderr(self.stderr.stdio());
        cmd
    }
}

#[async_trait]
impl Executor for Command {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let mut child = self.build().spawn()?;
        tracing::debug!(program = %self.program, pid = child.id(), "process spawned");

        let input = match &self.stdin {
            Input::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        };
        let feed = feed(child.stdin.take(), input);
        let out = drain(child.stdout.take(), self.stdout.buffer());
        let err = drain(child.stderr.take(), self.stderr.buffer());

        let finished = tokio::select! {
            res = async {
                let (fed, out, err, status) = tokio::join!(feed, out, err, child.wait());
                fed?;
                out?;
                err?;
                status
            } => Some(res),
            _ = ctx.cancelled() => None,
        };

        match finished {
            Some(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Command {
                        program: self.program.clone(),
                        status,
                    })
                }
            }
            None => {
                tracing::debug!(program = %self.program, "killing process on cancellation");
                if let Err(err) = child.kill().await {
                    tracing::warn!(
                        program = %self.program,
                        error = %err,
                        "failed to kill process"
                    );
                }
                Err(ctx.err().unwrap_or(Error::Canceled))
            }
        }
    }
}

async fn feed(pipe: Option<ChildStdin>, input: Option<Arc<[u8]>>) -> io::Result<()> {
    let (Some(mut pipe), Some(input)) = (pipe, input) else {
        return Ok(());
    };
    match pipe.write_all(&input).await {
        // the child may exit without reading its input
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
    // dropping the pipe closes the child's stdin
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: Option<&Buffer>) -> io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes).await?;
    if let Some(buf) = buf {
        buf.append(&bytes);
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn captures_stdout_and_feeds_stdin() {
        let out = Buffer::new();
        let cmd = Command::new("cat")
            .stdin(Input::Bytes(Arc::from(&b"hello pipe"[..])))
            .stdout(Output::Capture(out.clone()));
        cmd.execute(Context::new()).await.unwrap();
        assert_eq!(out.to_string_lossy(), "hello pipe");
    }

    #[tokio::test]
    async fn environment_is_passed() {
        let out = Buffer::new();
        let cmd = Command::new("sh")
            .args(["-c", "printf %s \"$GREETING\""])
            .env("GREETING", "hi")
            .stdout(Output::Capture(out.clone()));
        cmd.execute(Context::new()).await.unwrap();
        assert_eq!(out.to_string_lossy(), "hi");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let cmd = Command::new("sh").args(["-c", "exit 3"]);
        match cmd.execute(Context::new()).await {
            Err(Error::Command { status, .. }) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let cmd = Command::new("definitely-not-a-real-program-xyz");
        assert!(matches!(cmd.execute(Context::new()).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn cancellation_kills_the_process() {
        let cmd = Command::new("sleep").arg("30").stdin(Input::Null);
        let ctx = Context::new().with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        assert!(matches!(cmd.execute(ctx).await, Err(Error::DeadlineExceeded)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancellation_cause_survives_an_already_exited_child() {
        // the shell exits at once; the background sleep keeps the captured pipe open
        let out = Buffer::new();
        let cmd = Command::new("sh")
            .args(["-c", "sleep 2 & exit 0"])
            .stdout(Output::Capture(out.clone()));
        let ctx = Context::new().with_timeout(Duration::from_millis(100));
        assert!(matches!(cmd.execute(ctx).await, Err(Error::DeadlineExceeded)));
    }
}
