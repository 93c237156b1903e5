use crate::detect::EnvSource;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // 连通性检测
    pub probe_url: String,
    pub probe_timeout: u64,

    // 代理检测
    pub source_timeout: u64,
    pub use_system_settings: bool,
    pub profile_files: Vec<String>,

    // git 配置
    pub git_program: String,
    pub git_config_file: Option<String>,
    pub command_timeout: u64,
    pub dry_run: bool,

    // 输出
    pub print_progress: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_url: "https://github.com".to_string(),
            probe_timeout: 10000,
            source_timeout: 3000,
            use_system_settings: true,
            profile_files: vec![
                ".bashrc".to_string(),
                ".profile".to_string(),
                ".zshrc".to_string(),
            ],
            git_program: "git".to_string(),
            git_config_file: None,
            command_timeout: 10000,
            dry_run: false,
            print_progress: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        // 空文件等价于全部使用默认值
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// 环境变量覆盖：`GIT_PROXY_SYNC_PROBE_URL`、`GIT_PROXY_SYNC_PROBE_TIMEOUT`、
    /// `GIT_PROXY_SYNC_DRY_RUN`
    pub fn apply_env_overrides(&mut self, env: &dyn EnvSource) -> anyhow::Result<()> {
        if let Some(url) = env.var("GIT_PROXY_SYNC_PROBE_URL") {
            self.probe_url = url;
        }
        if let Some(timeout) = env.var("GIT_PROXY_SYNC_PROBE_TIMEOUT") {
            self.probe_timeout = timeout
                .trim()
                .parse()
                .with_context(|| format!("GIT_PROXY_SYNC_PROBE_TIMEOUT 无效: {}", timeout))?;
        }
        if let Some(dry_run) = env.var("GIT_PROXY_SYNC_DRY_RUN") {
            self.dry_run = matches!(
                dry_run.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.probe_url)
            .map_err(|e| anyhow!("检测地址无效 {}: {}", self.probe_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("检测地址必须是 http 或 https: {}", self.probe_url));
        }

        for (name, value) in [
            ("probe_timeout", self.probe_timeout),
            ("source_timeout", self.source_timeout),
            ("command_timeout", self.command_timeout),
        ] {
            if value == 0 {
                return Err(anyhow!("{} 不能为 0", name));
            }
        }

        if self.git_program.trim().is_empty() {
            return Err(anyhow!("git_program 不能为空"));
        }

        Ok(())
    }

    pub fn get_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout)
    }

    pub fn get_source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout)
    }

    pub fn get_command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout)
    }
}
