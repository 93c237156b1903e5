//! Windows 用户级 Internet Settings（WinINet）读取

use super::{SourceOutcome, select_server_entry};
use crate::proxy::Channel;
use std::time::Duration;

/// `ProxyEnable` 与 `ProxyServer` 两个值，缺失的值为 None
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternetSettings {
    pub proxy_enable: Option<u32>,
    pub proxy_server: Option<String>,
}

impl InternetSettings {
    pub fn is_enabled(&self) -> bool {
        self.proxy_enable.unwrap_or(0) != 0
    }

    /// 启用时的服务器列表，空白值视为未配置
    fn server(&self) -> Option<&str> {
        if !self.is_enabled() {
            return None;
        }
        self.proxy_server
            .as_deref()
            .map(str::trim)
            .filter(|server| !server.is_empty())
    }

    /// 系统代理设置：只接受按协议分列的形式（`http=..;https=..`）
    pub fn per_protocol_outcome(&self, channel: Channel) -> SourceOutcome {
        match self.server() {
            Some(server) if server.contains('=') => select_server_entry(server, channel).into(),
            _ => SourceOutcome::Absent,
        }
    }

    /// 回退来源：单一地址同时作用于两个通道
    pub fn fallback_outcome(&self, channel: Channel) -> SourceOutcome {
        match self.server() {
            Some(server) => select_server_entry(server, channel).into(),
            None => SourceOutcome::Absent,
        }
    }
}

/// 在阻塞线程中读取注册表，超时或出错时返回原因
pub async fn read(timeout: Duration) -> Result<InternetSettings, String> {
    let task = tokio::task::spawn_blocking(read_blocking);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(format!("读取注册表失败: {}", e)),
        Err(_) => Err(format!("读取注册表超时 ({}ms)", timeout.as_millis())),
    }
}

#[cfg(windows)]
fn read_blocking() -> Result<InternetSettings, String> {
    use winreg::RegKey;
    use winreg::enums::{HKEY_CURRENT_USER, KEY_READ};

    const INTERNET_SETTINGS_PATH: &str =
        r"Software\Microsoft\Windows\CurrentVersion\Internet Settings";

    let key = RegKey::predef(HKEY_CURRENT_USER)
        .open_subkey_with_flags(INTERNET_SETTINGS_PATH, KEY_READ)
        .map_err(|e| format!("无法打开 HKCU\\{}: {}", INTERNET_SETTINGS_PATH, e))?;

    Ok(InternetSettings {
        proxy_enable: optional_value(key.get_value::<u32, _>("ProxyEnable"), "ProxyEnable")?,
        proxy_server: optional_value(key.get_value::<String, _>("ProxyServer"), "ProxyServer")?,
    })
}

#[cfg(windows)]
fn optional_value<T>(result: std::io::Result<T>, name: &str) -> Result<Option<T>, String> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("读取 {} 失败: {}", name, e)),
    }
}

#[cfg(not(windows))]
fn read_blocking() -> Result<InternetSettings, String> {
    Err("当前平台没有 Windows 注册表".to_string())
}
