//! 连通性检测：经由检测到的代理向固定目标发起一次请求

use crate::detect::DetectedProxies;
use crate::proxy::{Channel, ProxyEndpoint};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::error::Error as _;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// 收到了响应（任意状态码）
    Reachable { status: u16 },
    /// 网络层失败
    Unreachable { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub target: String,
    /// 目标协议对应通道上使用的代理，None 表示直连
    pub via: Option<ProxyEndpoint>,
    pub outcome: ProbeOutcome,
    pub latency: Duration,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Reachable { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self.outcome {
            ProbeOutcome::Reachable { status } => Some(status),
            ProbeOutcome::Unreachable { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Reachable { .. } => None,
            ProbeOutcome::Unreachable { reason } => Some(reason),
        }
    }
}

pub struct ConnectivityProbe {
    target: String,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 单次尝试，不重试；任何失败都体现在返回值中
    pub async fn probe(&self, proxies: &DetectedProxies) -> ProbeResult {
        let via = Url::parse(&self.target)
            .ok()
            .as_ref()
            .and_then(Channel::for_url)
            .and_then(|channel| proxies.get(channel).cloned());

        let start = Instant::now();
        let outcome = match self.send(proxies).await {
            Ok(status) => {
                log::info!("连接 {} 成功，状态码 {}", self.target, status);
                ProbeOutcome::Reachable { status }
            }
            Err(reason) => {
                log::warn!("连接 {} 失败: {}", self.target, reason);
                ProbeOutcome::Unreachable { reason }
            }
        };

        ProbeResult {
            target: self.target.clone(),
            via,
            outcome,
            latency: start.elapsed(),
            checked_at: Utc::now(),
        }
    }

    async fn send(&self, proxies: &DetectedProxies) -> Result<u16, String> {
        let client = create_http_client(proxies, self.timeout)?;
        let response = client
            .get(&self.target)
            .send()
            .await
            .map_err(|e| describe_error(&e))?;
        Ok(response.status().as_u16())
    }
}

/// 只使用传入的代理，不读取进程环境中的代理变量
fn create_http_client(proxies: &DetectedProxies, timeout: Duration) -> Result<Client, String> {
    let mut builder = Client::builder()
        .no_proxy()
        .timeout(timeout)
        .user_agent(concat!("git-proxy-sync/", env!("CARGO_PKG_VERSION")));

    if let Some(endpoint) = &proxies.http {
        let proxy = reqwest::Proxy::http(endpoint.as_str())
            .map_err(|e| format!("http 代理地址无效 {}: {}", endpoint, e))?;
        builder = builder.proxy(proxy);
    }
    if let Some(endpoint) = &proxies.https {
        let proxy = reqwest::Proxy::https(endpoint.as_str())
            .map_err(|e| format!("https 代理地址无效 {}: {}", endpoint, e))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| format!("创建 HTTP 客户端失败: {}", e))
}

/// 把错误链展开成一行，便于定位 DNS/TLS/拒绝连接等底层原因
fn describe_error(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "超时"
    } else if err.is_connect() {
        "连接失败"
    } else {
        "请求失败"
    };

    let mut reason = format!("{}: {}", kind, err);
    let mut source = err.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// 启动只响应一次的 HTTP 服务，返回地址和收到的请求行
    async fn one_shot_server(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let first_line = request.lines().next().unwrap_or_default().to_string();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let _ = tx.send(first_line);
        });

        (addr, rx)
    }

    /// 获取一个当前没有监听的本地端口
    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        addr
    }

    const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";

    #[tokio::test]
    async fn test_any_status_counts_as_success() {
        let (addr, _rx) = one_shot_server(NOT_FOUND).await;
        let probe = ConnectivityProbe::new(format!("http://{}/", addr), Duration::from_secs(5));

        let result = probe.probe(&DetectedProxies::default()).await;
        assert!(result.is_success());
        assert_eq!(result.status(), Some(404));
        assert!(result.via.is_none());
    }

    #[tokio::test]
    async fn test_request_is_routed_through_http_proxy() {
        let (proxy_addr, rx) = one_shot_server(OK).await;
        let proxies = DetectedProxies::new(
            ProxyEndpoint::new(&format!("http://{}", proxy_addr)),
            None,
        );
        let probe = ConnectivityProbe::new("http://target.invalid/check", Duration::from_secs(5));

        let result = probe.probe(&proxies).await;
        assert!(result.is_success(), "{:?}", result.outcome);
        assert_eq!(result.status(), Some(200));
        assert_eq!(
            result.via.as_ref().map(|e| e.as_str()),
            Some(format!("http://{}", proxy_addr).as_str())
        );

        // 代理收到的是绝对形式的请求行
        let request_line = rx.await.unwrap();
        assert!(request_line.starts_with("GET http://target.invalid/check"));
    }

    #[tokio::test]
    async fn test_unreachable_proxy_reports_reason() {
        let proxy = closed_port().await;
        let proxies = DetectedProxies::new(ProxyEndpoint::new(&format!("http://{}", proxy)), None);
        let probe = ConnectivityProbe::new("http://target.invalid/", Duration::from_secs(5));

        let result = probe.probe(&proxies).await;
        assert!(!result.is_success());
        assert!(!result.failure_reason().unwrap().is_empty());
        assert_eq!(result.status(), None);
    }

    #[tokio::test]
    async fn test_closed_port_direct_connection_fails() {
        let addr = closed_port().await;
        let probe = ConnectivityProbe::new(format!("http://{}/", addr), Duration::from_secs(5));

        let result = probe.probe(&DetectedProxies::default()).await;
        assert!(!result.is_success());
        assert!(result.failure_reason().unwrap().contains("连接失败"));
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        // 只接受连接、从不响应
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let probe = ConnectivityProbe::new(format!("http://{}/", addr), Duration::from_millis(300));
        let start = Instant::now();
        let result = probe.probe(&DetectedProxies::default()).await;

        assert!(!result.is_success());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(result.failure_reason().unwrap().contains("超时"));
    }

    #[tokio::test]
    async fn test_socks5_endpoint_is_accepted() {
        let proxy = closed_port().await;
        let proxies = DetectedProxies::new(
            ProxyEndpoint::new(&format!("socks5://{}", proxy)),
            ProxyEndpoint::new(&format!("socks5h://{}", proxy)),
        );
        let probe = ConnectivityProbe::new("http://target.invalid/", Duration::from_secs(5));

        let result = probe.probe(&proxies).await;
        // 代理本身不可达，但地址能被接受
        assert!(!result.is_success());
        assert!(!result.failure_reason().unwrap().contains("代理地址无效"));
    }

    #[tokio::test]
    async fn test_invalid_proxy_url_is_a_failure_not_a_panic() {
        let proxies = DetectedProxies::new(None, ProxyEndpoint::new("http://[::1"));
        let probe = ConnectivityProbe::new("https://github.com", Duration::from_secs(1));

        let result = probe.probe(&proxies).await;
        assert!(!result.is_success());
        assert!(result.failure_reason().unwrap().contains("https 代理地址无效"));
    }
}
