//! A tool for executing external commands.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Represents a command executor.
///
/// # Example
///
/// ```rust,no_run
/// # use std::path::PathBuf;
/// # use std::time::Duration;
/// # use streamkit::executor::Executor;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = Executor {
///     executable_path: PathBuf::from("ffmpeg"),
///     timeout: Duration::from_secs(30),
///     args: vec!["-version".to_string()],
/// };
///
/// let output = executor.execute().await?;
/// println!("Output: {}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Executor {
    /// The path to the command executable.
    pub executable_path: PathBuf,
    /// The timeout for the process.
    pub timeout: Duration,

    /// The arguments to pass to the command.
    pub args: Vec<String>,
}

/// Represents the output of a process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// The stdout of the process.
    pub stdout: String,
    /// The stderr of the process.
    pub stderr: String,
    /// The exit code of the process.
    pub code: i32,
}

impl Executor {
    /// Executes the command and returns the output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] if the executable does not exist,
    /// [`Error::Timeout`] if the process outlives its deadline, and
    /// [`Error::ExternalTool`] with the captured stderr on a non-zero exit.
    pub async fn execute(&self) -> Result<ProcessOutput> {
        log::debug!("Executing command: {:?}", self);

        let mut command = tokio::process::Command::new(&self.executable_path);
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());
        command.stdin(std::process::Stdio::null());
        command.kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(0x08000000);
        }

        command.args(&self.args);
        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ToolNotFound(self.executable_path.clone()),
            _ => Error::IO(e),
        })?;

        // Drain both pipes while waiting, a chatty child would otherwise block on a full pipe.
        let stdout_handle = take_pipe(child.stdout.take(), "stdout")?;
        let stderr_handle = take_pipe(child.stderr.take(), "stderr")?;

        let stdout_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            tokio::io::copy(&mut tokio::io::BufReader::new(stdout_handle), &mut buffer).await?;
            Ok::<Vec<u8>, std::io::Error>(buffer)
        });

        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            tokio::io::copy(&mut tokio::io::BufReader::new(stderr_handle), &mut buffer).await?;
            Ok::<Vec<u8>, std::io::Error>(buffer)
        });

        let exit_status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(result) => result?,
            Err(_) => {
                log::warn!("Process timed out after {:?}, killing it", self.timeout);

                if let Err(e) = child.kill().await {
                    log::error!("Failed to kill process after timeout: {}", e);
                }

                return Err(Error::Timeout(self.timeout));
            }
        };

        let stdout = stdout_task.await??;
        let stderr = stderr_task.await??;

        // Tools print localized or binary garbage now and then, keep what we can.
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        let code = exit_status.code();
        if exit_status.success() {
            return Ok(ProcessOutput {
                stdout,
                stderr,
                code: code.unwrap_or(0),
            });
        }

        Err(Error::ExternalTool {
            tool: self.tool_name(),
            code,
            stderr: stderr.trim().to_string(),
        })
    }

    fn tool_name(&self) -> String {
        self.executable_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.executable_path.display().to_string())
    }
}

/// A pipe that was requested but not attached is an IO failure of the spawn.
fn take_pipe<T>(pipe: Option<T>, name: &str) -> Result<T> {
    pipe.ok_or_else(|| Error::IO(std::io::Error::other(format!("Failed to capture {}", name))))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn executor(program: &str, args: &[&str]) -> Executor {
        Executor {
            executable_path: PathBuf::from(program),
            timeout: Duration::from_secs(10),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let output = executor("sh", &["-c", "echo hello"]).execute().await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.code, 0);
    }

    #[tokio::test]
    async fn test_execute_reports_failure_with_stderr() {
        let err = executor("sh", &["-c", "echo broken pipe >&2; exit 3"])
            .execute()
            .await
            .unwrap_err();

        match err {
            Error::ExternalTool { tool, code, stderr } => {
                assert_eq!(tool, "sh");
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken pipe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_missing_binary() {
        let err = executor("/nonexistent/definitely-not-here", &[])
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
        assert!(err.is_external_tool());
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let mut slow = executor("sh", &["-c", "sleep 5"]);
        slow.timeout = Duration::from_millis(100);

        let err = slow.execute().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_missing_pipe_is_an_io_error() {
        let err = take_pipe::<()>(None, "stdout").unwrap_err();

        assert!(matches!(&err, Error::IO(e) if e.to_string() == "Failed to capture stdout"));
        assert!(err.is_download());
        assert_eq!(take_pipe(Some(7), "stderr").unwrap(), 7);
    }
}
