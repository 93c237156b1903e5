//! 代理通道与代理地址模型

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// 代理通道：http 与 https 相互独立
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Http,
    Https,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Http, Channel::Https];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Http => "http",
            Channel::Https => "https",
        }
    }

    /// 小写环境变量名，如 `http_proxy`
    pub fn env_var_lower(&self) -> &'static str {
        match self {
            Channel::Http => "http_proxy",
            Channel::Https => "https_proxy",
        }
    }

    /// 大写环境变量名，如 `HTTP_PROXY`
    pub fn env_var_upper(&self) -> &'static str {
        match self {
            Channel::Http => "HTTP_PROXY",
            Channel::Https => "HTTPS_PROXY",
        }
    }

    /// git 配置中的键名
    pub fn git_key(&self) -> &'static str {
        match self {
            Channel::Http => "http.proxy",
            Channel::Https => "https.proxy",
        }
    }

    /// 根据目标 URL 的协议选择通道
    pub fn for_url(url: &Url) -> Option<Channel> {
        match url.scheme() {
            "http" => Some(Channel::Http),
            "https" => Some(Channel::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个通道上生效的代理地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyEndpoint(String);

impl ProxyEndpoint {
    /// 按原样接受代理地址，空白值视为不存在
    pub fn new(raw: &str) -> Option<Self> {
        let value = raw.trim();
        (!value.is_empty()).then(|| Self(value.to_string()))
    }

    /// 缺少协议头时补上 `http://`
    pub fn normalized(raw: &str) -> Option<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        if has_scheme(value) {
            Some(Self(value.to_string()))
        } else {
            Some(Self(format!("http://{}", value)))
        }
    }

    /// 由主机与端口组装地址
    pub fn from_host_port(host: &str, port: u16) -> Option<Self> {
        let host = host.trim();
        if host.is_empty() || port == 0 {
            return None;
        }
        Self::normalized(&format!("{}:{}", host, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_scheme(value: &str) -> bool {
    match value.find("://") {
        Some(idx) => {
            let scheme = &value[..idx];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
