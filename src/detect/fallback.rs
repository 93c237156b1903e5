//! 平台回退来源：Windows 注册表，或类 Unix 系统的 shell 启动文件

use super::{EnvSource, ProxySource, SourceOutcome, registry};
use crate::proxy::{Channel, ProxyEndpoint};
use async_trait::async_trait;
use regex::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// 按平台选择回退来源
pub fn for_current_platform(
    env: Arc<dyn EnvSource>,
    profile_files: &[String],
    timeout: Duration,
) -> Box<dyn ProxySource> {
    if cfg!(windows) {
        Box::new(RegistryFallback::new(timeout))
    } else {
        Box::new(ShellProfileFallback::new(env, profile_files.to_vec(), timeout))
    }
}

// ---------- shell 配置文件 ----------

/// 依次扫描用户主目录下的 shell 启动文件，查找 `export <channel>_proxy=...`
pub struct ShellProfileFallback {
    env: Arc<dyn EnvSource>,
    files: Vec<String>,
    timeout: Duration,
}

impl ShellProfileFallback {
    pub fn new(env: Arc<dyn EnvSource>, files: Vec<String>, timeout: Duration) -> Self {
        Self {
            env,
            files,
            timeout,
        }
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.env
            .var("HOME")
            .or_else(|| self.env.var("USERPROFILE"))
            .filter(|home| !home.trim().is_empty())
            .map(PathBuf::from)
    }
}

#[async_trait]
impl ProxySource for ShellProfileFallback {
    fn name(&self) -> &'static str {
        "shell profile"
    }

    async fn lookup(&self, channel: Channel) -> SourceOutcome {
        let Some(home) = self.home_dir() else {
            return SourceOutcome::Ignored("无法确定用户主目录".to_string());
        };

        let mut unreadable = Vec::new();

        for file in &self.files {
            let path = home.join(file);
            let read = tokio::time::timeout(self.timeout, tokio::fs::read_to_string(&path));
            match read.await {
                Ok(Ok(content)) => {
                    if let Some(endpoint) = scan_profile(&content, channel) {
                        log::debug!("在 {} 中找到 {} 代理", path.display(), channel);
                        return SourceOutcome::Found(endpoint);
                    }
                }
                Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {}
                Ok(Err(e)) => unreadable.push(format!("{}: {}", path.display(), e)),
                Err(_) => unreadable.push(format!(
                    "{}: 读取超时 ({}ms)",
                    path.display(),
                    self.timeout.as_millis()
                )),
            }
        }

        if unreadable.is_empty() {
            SourceOutcome::Absent
        } else {
            SourceOutcome::Ignored(unreadable.join("; "))
        }
    }
}

/// `export http_proxy=...` / `export https_proxy=...`，变量名不区分大小写
static EXPORT_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*export\s+(https?)_proxy\s*=\s*(.*?)\s*$").ok()
});

/// 在文件内容中查找该通道第一条非空的 `export` 行
pub(crate) fn scan_profile(content: &str, channel: Channel) -> Option<ProxyEndpoint> {
    let re = EXPORT_LINE.as_ref()?;

    content
        .lines()
        .filter_map(|line| re.captures(line))
        .filter(|caps| caps[1].eq_ignore_ascii_case(channel.as_str()))
        .filter_map(|caps| caps.get(2))
        .map(|value| value.as_str().trim_matches(|c: char| c == '"' || c == '\''))
        .find_map(ProxyEndpoint::new)
}

// ---------- 注册表 ----------

/// 读取 HKCU Internet Settings 下的 `ProxyEnable` 与 `ProxyServer`
pub struct RegistryFallback {
    timeout: Duration,
}

impl RegistryFallback {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProxySource for RegistryFallback {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn lookup(&self, channel: Channel) -> SourceOutcome {
        match registry::read(self.timeout).await {
            Ok(settings) => settings.fallback_outcome(channel),
            Err(reason) => SourceOutcome::Ignored(reason),
        }
    }
}
