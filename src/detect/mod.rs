//! 代理检测
//!
//! 每个通道按固定优先级依次询问各个来源，第一个给出地址的来源胜出：
//! 小写环境变量、大写环境变量、系统代理设置、平台回退来源（注册表或 shell 配置文件）。
//! 任何来源出错都只记为“忽略”，检测本身永不失败。

mod env;
pub mod fallback;
mod registry;
pub mod system;

pub use env::{EnvSource, EnvVarSource, ProcessEnv, VarCase};

use crate::config::Config;
use crate::proxy::{Channel, ProxyEndpoint};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// 单个来源对某个通道的查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum SourceOutcome {
    /// 找到代理地址
    Found(ProxyEndpoint),
    /// 来源可用，但没有配置
    Absent,
    /// 来源不可用（读取失败、命令不存在、超时等），按无结果处理
    Ignored(String),
}

impl SourceOutcome {
    pub fn endpoint(&self) -> Option<&ProxyEndpoint> {
        match self {
            SourceOutcome::Found(endpoint) => Some(endpoint),
            _ => None,
        }
    }
}

impl From<Option<ProxyEndpoint>> for SourceOutcome {
    fn from(value: Option<ProxyEndpoint>) -> Self {
        match value {
            Some(endpoint) => SourceOutcome::Found(endpoint),
            None => SourceOutcome::Absent,
        }
    }
}

/// 一次查询的记录，仅用于诊断输出
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub channel: Channel,
    pub source: String,
    pub outcome: SourceOutcome,
}

/// 代理设置来源
#[async_trait]
pub trait ProxySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// 诊断记录中展示的来源名称
    fn describe(&self, _channel: Channel) -> String {
        self.name().to_string()
    }

    /// 查询某个通道的代理，内部错误必须转换为 `Ignored`
    async fn lookup(&self, channel: Channel) -> SourceOutcome;
}

/// 检测结果：每个通道至多一个代理地址
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectedProxies {
    pub http: Option<ProxyEndpoint>,
    pub https: Option<ProxyEndpoint>,
    pub records: Vec<SourceRecord>,
}

impl DetectedProxies {
    pub fn new(http: Option<ProxyEndpoint>, https: Option<ProxyEndpoint>) -> Self {
        Self {
            http,
            https,
            records: Vec::new(),
        }
    }

    pub fn get(&self, channel: Channel) -> Option<&ProxyEndpoint> {
        match channel {
            Channel::Http => self.http.as_ref(),
            Channel::Https => self.https.as_ref(),
        }
    }

    fn set(&mut self, channel: Channel, endpoint: Option<ProxyEndpoint>) {
        match channel {
            Channel::Http => self.http = endpoint,
            Channel::Https => self.https = endpoint,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }

    pub fn records_for(&self, channel: Channel) -> impl Iterator<Item = &SourceRecord> {
        self.records.iter().filter(move |r| r.channel == channel)
    }

    /// 给出该通道地址的来源
    pub fn winning_source(&self, channel: Channel) -> Option<&str> {
        self.records_for(channel)
            .find(|r| r.outcome.endpoint().is_some())
            .map(|r| r.source.as_str())
    }
}

/// 代理检测器
pub struct ProxyDetector {
    sources: Vec<Box<dyn ProxySource>>,
}

impl ProxyDetector {
    /// 使用给定的来源列表（按优先级从高到低）
    pub fn new(sources: Vec<Box<dyn ProxySource>>) -> Self {
        Self { sources }
    }

    /// 按当前平台组装标准来源链
    pub fn for_platform(env: Arc<dyn EnvSource>, config: &Config) -> Self {
        let source_timeout = config.get_source_timeout();

        let mut sources: Vec<Box<dyn ProxySource>> = vec![
            Box::new(EnvVarSource::new(env.clone(), VarCase::Lower)),
            Box::new(EnvVarSource::new(env.clone(), VarCase::Upper)),
        ];

        if config.use_system_settings {
            sources.push(system::for_current_platform(source_timeout));
        }

        sources.push(fallback::for_current_platform(
            env,
            &config.profile_files,
            source_timeout,
        ));

        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn detect(&self) -> DetectedProxies {
        let mut detected = DetectedProxies::default();

        for channel in Channel::ALL {
            let endpoint = self.resolve(channel, &mut detected.records).await;
            match &endpoint {
                Some(endpoint) => log::info!("{} 代理: {}", channel, endpoint),
                None => log::info!("{} 代理: 未检测到", channel),
            }
            detected.set(channel, endpoint);
        }

        detected
    }

    async fn resolve(
        &self,
        channel: Channel,
        records: &mut Vec<SourceRecord>,
    ) -> Option<ProxyEndpoint> {
        for source in &self.sources {
            let label = source.describe(channel);
            let outcome = source.lookup(channel).await;

            match &outcome {
                SourceOutcome::Found(endpoint) => {
                    log::debug!("[{}] {} 命中: {}", channel, label, endpoint)
                }
                SourceOutcome::Absent => log::debug!("[{}] {} 无配置", channel, label),
                SourceOutcome::Ignored(reason) => {
                    log::debug!("[{}] 忽略来源 {}: {}", channel, label, reason)
                }
            }

            let found = outcome.endpoint().cloned();
            records.push(SourceRecord {
                channel,
                source: label,
                outcome,
            });

            if found.is_some() {
                return found;
            }
        }

        None
    }
}

/// 从代理服务器列表中挑出通道对应的地址
///
/// 支持单一地址（`host:port`，作用于所有通道）与按协议分列的形式
/// （`http=host:port;https=host:port`）。缺少协议头的地址会补上 `http://`。
pub(crate) fn select_server_entry(server: &str, channel: Channel) -> Option<ProxyEndpoint> {
    let server = server.trim();
    if !server.contains('=') {
        return ProxyEndpoint::normalized(server);
    }

    server
        .split(';')
        .filter_map(|entry| entry.split_once('='))
        .find(|(proto, _)| proto.trim().eq_ignore_ascii_case(channel.as_str()))
        .and_then(|(_, addr)| ProxyEndpoint::normalized(addr))
}
