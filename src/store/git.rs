use super::{ProxyConfigStore, StoreError};
use crate::command::{self, CommandOutput};
use crate::proxy::Channel;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// `git config` 退出码：键不存在（--get）
const EXIT_KEY_MISSING: i32 = 1;
/// `git config` 退出码：要删除的键不存在（--unset-all）
const EXIT_NOTHING_TO_UNSET: i32 = 5;

/// git 配置作用域
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitScope {
    Global,
    File(PathBuf),
}

impl GitScope {
    fn args(&self) -> Vec<String> {
        match self {
            GitScope::Global => vec!["--global".to_string()],
            GitScope::File(path) => {
                vec!["--file".to_string(), path.to_string_lossy().into_owned()]
            }
        }
    }
}

/// 通过 `git config` 读写 `http.proxy` / `https.proxy`
#[derive(Debug, Clone)]
pub struct GitConfigStore {
    program: String,
    scope: GitScope,
    timeout: Duration,
}

impl GitConfigStore {
    pub fn new(program: impl Into<String>, scope: GitScope, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            scope,
            timeout,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<CommandOutput, StoreError> {
        let mut full: Vec<String> = vec!["config".to_string()];
        full.extend(self.scope.args());
        full.extend(args.iter().map(|a| a.to_string()));

        let full: Vec<&str> = full.iter().map(String::as_str).collect();
        Ok(command::run(&self.program, &full, self.timeout).await?)
    }
}

fn rejected(operation: &'static str, channel: Channel, output: &CommandOutput) -> StoreError {
    StoreError::Rejected {
        operation,
        key: channel.git_key().to_string(),
        code: output.code,
        stderr: output.stderr.trim().to_string(),
    }
}

/// 将 `git config --get` 的结果映射为值
pub(crate) fn interpret_get(
    channel: Channel,
    output: &CommandOutput,
) -> Result<Option<String>, StoreError> {
    match output.code {
        Some(0) => {
            let value = output.stdout.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Some(EXIT_KEY_MISSING) => Ok(None),
        _ => Err(rejected("get", channel, output)),
    }
}

/// 将 `git config --unset-all` 的结果映射为成功/失败，键不存在视为成功
pub(crate) fn interpret_unset(
    channel: Channel,
    output: &CommandOutput,
) -> Result<(), StoreError> {
    match output.code {
        Some(0) | Some(EXIT_NOTHING_TO_UNSET) => Ok(()),
        _ => Err(rejected("unset", channel, output)),
    }
}

#[async_trait]
impl ProxyConfigStore for GitConfigStore {
    async fn get(&self, channel: Channel) -> Result<Option<String>, StoreError> {
        let output = self.git(&["--get", channel.git_key()]).await?;
        interpret_get(channel, &output)
    }

    async fn set(&self, channel: Channel, value: &str) -> Result<(), StoreError> {
        // --replace-all 会把重复的条目合并成一条
        let output = self
            .git(&["--replace-all", channel.git_key(), value])
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(rejected("set", channel, &output))
        }
    }

    async fn unset(&self, channel: Channel) -> Result<(), StoreError> {
        let output = self.git(&["--unset-all", channel.git_key()]).await?;
        interpret_unset(channel, &output)
    }

    fn describe(&self) -> String {
        match &self.scope {
            GitScope::Global => format!("{} config --global", self.program),
            GitScope::File(path) => {
                format!("{} config --file {}", self.program, path.display())
            }
        }
    }
}
