//! 系统代理设置查询
//!
//! Linux 读取 GNOME (gsettings)，macOS 读取 `scutil --proxy`，Windows 读取用户级
//! Internet Settings 中按协议分列的 `ProxyServer`。命令不存在、超时或读取失败时均视为无结果。

use super::{ProxySource, SourceOutcome, registry};
use crate::command;
use crate::proxy::{Channel, ProxyEndpoint};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// 按平台选择系统代理来源
pub fn for_current_platform(timeout: Duration) -> Box<dyn ProxySource> {
    if cfg!(target_os = "linux") {
        Box::new(GnomeProxySettings::new(timeout))
    } else if cfg!(target_os = "macos") {
        Box::new(ScutilProxySettings::new(timeout))
    } else if cfg!(windows) {
        Box::new(WinInetProxySettings::new(timeout))
    } else {
        Box::new(NoSystemSettings)
    }
}

/// 执行查询命令，失败时返回忽略原因
async fn query(program: &str, args: &[&str], timeout: Duration) -> Result<String, String> {
    let output = command::run(program, args, timeout)
        .await
        .map_err(|e| e.to_string())?;

    if output.success() {
        Ok(output.stdout)
    } else {
        Err(format!(
            "{} 退出码 {:?}: {}",
            program,
            output.code,
            output.stderr.trim()
        ))
    }
}

/// 不支持系统代理查询的平台
pub struct NoSystemSettings;

#[async_trait]
impl ProxySource for NoSystemSettings {
    fn name(&self) -> &'static str {
        "system (unsupported)"
    }

    async fn lookup(&self, _channel: Channel) -> SourceOutcome {
        SourceOutcome::Absent
    }
}

// ---------- GNOME ----------

pub struct GnomeProxySettings {
    timeout: Duration,
}

impl GnomeProxySettings {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn get(&self, schema: &str, key: &str) -> Result<String, String> {
        query("gsettings", &["get", schema, key], self.timeout).await
    }
}

#[async_trait]
impl ProxySource for GnomeProxySettings {
    fn name(&self) -> &'static str {
        "system:gsettings"
    }

    async fn lookup(&self, channel: Channel) -> SourceOutcome {
        let mode = match self.get("org.gnome.system.proxy", "mode").await {
            Ok(mode) => parse_gsettings_string(&mode),
            Err(reason) => return SourceOutcome::Ignored(reason),
        };
        if mode != "manual" {
            return SourceOutcome::Absent;
        }

        let schema = format!("org.gnome.system.proxy.{}", channel);
        let host = match self.get(&schema, "host").await {
            Ok(host) => parse_gsettings_string(&host),
            Err(reason) => return SourceOutcome::Ignored(reason),
        };
        let port = match self.get(&schema, "port").await {
            Ok(port) => parse_gsettings_port(&port),
            Err(reason) => return SourceOutcome::Ignored(reason),
        };

        match port {
            Some(port) => ProxyEndpoint::from_host_port(&host, port).into(),
            None => SourceOutcome::Absent,
        }
    }
}

/// `'manual'` → `manual`
pub(crate) fn parse_gsettings_string(raw: &str) -> String {
    raw.trim().trim_matches('\'').trim_matches('"').to_string()
}

/// `8080` 或 `uint32 8080` → 8080
pub(crate) fn parse_gsettings_port(raw: &str) -> Option<u16> {
    raw.split_whitespace().last()?.parse().ok()
}

// ---------- macOS ----------

pub struct ScutilProxySettings {
    timeout: Duration,
}

impl ScutilProxySettings {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProxySource for ScutilProxySettings {
    fn name(&self) -> &'static str {
        "system:scutil"
    }

    async fn lookup(&self, channel: Channel) -> SourceOutcome {
        match query("scutil", &["--proxy"], self.timeout).await {
            Ok(output) => scutil_endpoint(&parse_scutil(&output), channel).into(),
            Err(reason) => SourceOutcome::Ignored(reason),
        }
    }
}

/// 解析 `scutil --proxy` 输出中的 `Key : Value` 行
pub(crate) fn parse_scutil(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once(" : "))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

pub(crate) fn scutil_endpoint(
    values: &HashMap<String, String>,
    channel: Channel,
) -> Option<ProxyEndpoint> {
    let prefix = match channel {
        Channel::Http => "HTTP",
        Channel::Https => "HTTPS",
    };

    let enabled = values.get(&format!("{}Enable", prefix))?;
    if enabled != "1" {
        return None;
    }
    let host = values.get(&format!("{}Proxy", prefix))?;
    let port = values.get(&format!("{}Port", prefix))?.parse().ok()?;
    ProxyEndpoint::from_host_port(host, port)
}

// ---------- Windows ----------

/// 用户级 Internet Settings 中按协议分列的代理
pub struct WinInetProxySettings {
    timeout: Duration,
}

impl WinInetProxySettings {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProxySource for WinInetProxySettings {
    fn name(&self) -> &'static str {
        "system:wininet"
    }

    async fn lookup(&self, channel: Channel) -> SourceOutcome {
        match registry::read(self.timeout).await {
            Ok(settings) => settings.per_protocol_outcome(channel),
            Err(reason) => SourceOutcome::Ignored(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsettings_parsing() {
        assert_eq!(parse_gsettings_string("'manual'\n"), "manual");
        assert_eq!(parse_gsettings_string("'proxy.corp'"), "proxy.corp");
        assert_eq!(parse_gsettings_string("''"), "");
        assert_eq!(parse_gsettings_port("8080\n"), Some(8080));
        assert_eq!(parse_gsettings_port("uint32 3128"), Some(3128));
        assert_eq!(parse_gsettings_port("nope"), None);
    }

    #[test]
    fn test_scutil_parsing() {
        let output = "<dictionary> {\n  ExceptionsList : <array> {\n    0 : *.local\n  }\n  \
                      HTTPEnable : 1\n  HTTPPort : 8080\n  HTTPProxy : proxy.corp\n  \
                      HTTPSEnable : 0\n  HTTPSPort : 8443\n  HTTPSProxy : secure.corp\n}\n";
        let values = parse_scutil(output);

        assert_eq!(
            scutil_endpoint(&values, Channel::Http).unwrap().as_str(),
            "http://proxy.corp:8080"
        );
        assert!(scutil_endpoint(&values, Channel::Https).is_none());
    }

    #[test]
    fn test_scutil_without_proxy_keys() {
        let values = parse_scutil("<dictionary> {\n  HTTPEnable : 1\n}\n");
        assert!(scutil_endpoint(&values, Channel::Http).is_none());
    }

    #[tokio::test]
    async fn test_unsupported_platform_is_absent() {
        assert_eq!(
            NoSystemSettings.lookup(Channel::Http).await,
            SourceOutcome::Absent
        );
    }
}
