//! 检测 → 连通性验证 → 同步 git 配置

use crate::config::Config;
use crate::detect::{DetectedProxies, EnvSource, ProxyDetector};
use crate::probe::{ConnectivityProbe, ProbeResult};
use crate::reconcile::{ConfigReconciler, ReconcileReport};
use crate::store::{GitConfigStore, GitScope, ProxyConfigStore};
use crate::ui::progress::ProbeSpinner;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// 一次完整运行的结果
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub platform: String,
    pub detected: DetectedProxies,
    pub probe: ProbeResult,
    pub reconcile: ReconcileReport,
}

impl RunSummary {
    /// 退出码只取决于连通性检测
    pub fn is_success(&self) -> bool {
        self.probe.is_success()
    }
}

pub fn platform_description() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

pub fn git_store(config: &Config) -> GitConfigStore {
    let scope = match &config.git_config_file {
        Some(path) => GitScope::File(PathBuf::from(path)),
        None => GitScope::Global,
    };
    GitConfigStore::new(&config.git_program, scope, config.get_command_timeout())
}

/// 运行完整流程；同步不依赖连通性检测的结果
pub async fn run(
    config: &Config,
    env: Arc<dyn EnvSource>,
    store: &dyn ProxyConfigStore,
    show_progress: bool,
) -> anyhow::Result<RunSummary> {
    config.validate()?;

    let detector = ProxyDetector::for_platform(env, config);
    log::debug!("代理来源（按优先级）: {:?}", detector.source_names());
    let detected = detector.detect().await;

    let probe = ConnectivityProbe::new(&config.probe_url, config.get_probe_timeout());
    let spinner = ProbeSpinner::new(
        show_progress && config.print_progress,
        format!("正在连接 {} ...", probe.target()),
    );
    let probe_result = probe.probe(&detected).await;
    spinner.finish();

    let reconcile = ConfigReconciler::new(store)
        .dry_run(config.dry_run)
        .reconcile(&detected)
        .await;

    Ok(RunSummary {
        platform: platform_description(),
        detected,
        probe: probe_result,
        reconcile,
    })
}
