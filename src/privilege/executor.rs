use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::credential::Credential;

/// Captured output of a successful command
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ExecError {
    /// The process ran and exited non-zero
    #[error("{output}")]
    CommandFailed { output: String },

    /// The process could not be started at all
    #[error("failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// The native consent dialog reports a dismissal as error -128
    pub fn is_user_cancelled(&self) -> bool {
        match self {
            ExecError::CommandFailed { output } => {
                output.contains("User canceled") || output.contains("-128")
            }
            ExecError::SpawnFailed { .. } => false,
        }
    }
}

/// External programs the executor drives
#[derive(Debug, Clone)]
pub struct ExecutorPaths {
    /// Elevation helper fed a secret on stdin
    pub sudo: PathBuf,
    /// Arguments placed before the helper's own flags
    pub sudo_prefix: Vec<String>,
    /// Runner for the native administrator prompt
    pub osascript: PathBuf,
    /// Shell that interprets command strings
    pub shell: PathBuf,
}

impl Default for ExecutorPaths {
    fn default() -> Self {
        Self {
            sudo: PathBuf::from("/usr/bin/sudo"),
            sudo_prefix: Vec::new(),
            osascript: PathBuf::from("/usr/bin/osascript"),
            shell: PathBuf::from("/bin/bash"),
        }
    }
}

/// Runs external commands as the current user or elevated.
/// Never retries; retry policy belongs to callers.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    paths: ExecutorPaths,
}

impl Executor {
    pub fn new(paths: ExecutorPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ExecutorPaths {
        &self.paths
    }

    /// Spawn `program` directly as the current user
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<Output, ExecError> {
        debug!(program, ?args, "running command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            Ok(Output { stdout, stderr })
        } else {
            Err(ExecError::CommandFailed {
                output: format!("{}\n{}", stdout, stderr),
            })
        }
    }

    /// Run a full shell string (pipes, `;`, globs) as the current user
    pub async fn run_shell(&self, command: &str) -> Result<Output, ExecError> {
        let shell = self.paths.shell.to_string_lossy().into_owned();
        self.run(&shell, &["-c", command]).await
    }

    /// Run `command` with administrator rights through the OS consent dialog
    pub async fn run_elevated_interactive(&self, command: &str) -> Result<Output, ExecError> {
        let script = applescript_command(command);
        let osascript = self.paths.osascript.to_string_lossy().into_owned();
        self.run(&osascript, &["-e", &script]).await
    }

    /// Run `command` through the elevation helper, feeding it the secret
    /// on stdin.
    ///
    /// A non-zero exit cannot be told apart from a rejected secret, so
    /// callers must treat any `CommandFailed` as a stale credential.
    pub async fn run_elevated_with_credential(
        &self,
        command: &str,
        credential: &Credential,
    ) -> Result<Output, ExecError> {
        let program = self.paths.sudo.to_string_lossy().into_owned();
        let spawn_failed = |source| ExecError::SpawnFailed {
            program: program.clone(),
            source,
        };

        // -S reads the secret from stdin, -p '' silences the prompt
        let mut child = Command::new(&self.paths.sudo)
            .args(&self.paths.sudo_prefix)
            .args(["-S", "-p", ""])
            .arg(&self.paths.shell)
            .args(["-c", command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        if let Some(mut stdin) = child.stdin.take() {
            let line = format!("{}\n", credential.expose());
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                // The helper may exit before reading; its status tells the rest
                debug!(error = %e, "elevation helper closed stdin early");
            }
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(spawn_failed)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(Output { stdout, stderr })
        } else {
            let output = if stderr.trim().is_empty() { stdout } else { stderr };
            Err(ExecError::CommandFailed { output })
        }
    }
}

/// Wrap a shell string in an AppleScript admin invocation
pub fn applescript_command(command: &str) -> String {
    let escaped = command.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "do shell script \"{}\" with administrator privileges",
        escaped
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applescript_escaping() {
        let script = applescript_command(r#"rm -rf "/Library/Caches"/* \ x"#);
        assert_eq!(
            script,
            r#"do shell script "rm -rf \"/Library/Caches\"/* \\ x" with administrator privileges"#
        );
    }

    #[test]
    fn test_user_cancel_detection() {
        let cancelled = ExecError::CommandFailed {
            output: "execution error: User canceled. (-128)".into(),
        };
        assert!(cancelled.is_user_cancelled());

        let failed = ExecError::CommandFailed {
            output: "permission denied".into(),
        };
        assert!(!failed.is_user_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = Executor::default().run("echo", &["hello"]).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_non_zero_is_command_failed() {
        let err = Executor::default()
            .run("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            ExecError::CommandFailed { output } => {
                assert!(output.contains("out"));
                assert!(output.contains("err"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failed() {
        let err = Executor::default()
            .run("/definitely/not/a/binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_helper_is_spawn_failed() {
        let executor = Executor::new(ExecutorPaths {
            sudo: PathBuf::from("/definitely/not/sudo"),
            ..ExecutorPaths::default()
        });
        let err = executor
            .run_elevated_with_credential("true", &Credential::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::SpawnFailed { .. }));
    }
}
