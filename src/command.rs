//! 带超时的外部命令执行

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("无法启动 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("等待 {program} 结束失败: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} 超时 ({}ms)", .timeout.as_millis())]
    TimedOut { program: String, timeout: Duration },
}

/// 命令执行结果
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// 退出码（被信号终止时为 None）
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 执行命令并等待结束，超时后子进程会被终止
pub async fn run(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    log::debug!("执行命令: {} {}", program, args.join(" "));

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| CommandError::Wait {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(CommandError::TimedOut {
                program: program.to_string(),
                timeout,
            });
        }
    };

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output_and_code() {
        let output = run("sh", &["-c", "echo hello; exit 3"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let result = run(
            "definitely-not-a-real-binary-xyz",
            &[],
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[test]
    fn test_wait_failure_is_not_reported_as_spawn() {
        let err = CommandError::Wait {
            program: "git".to_string(),
            source: std::io::Error::other("broken pipe"),
        };
        let message = err.to_string();
        assert!(message.contains("等待 git"));
        assert!(!message.contains("无法启动"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let result = run("sleep", &["5"], Duration::from_millis(100)).await;
        assert!(matches!(result, Err(CommandError::TimedOut { .. })));
    }
}
