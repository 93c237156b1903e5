use super::OutputFormat;
use crate::app::RunSummary;
use crate::detect::{DetectedProxies, SourceOutcome};
use crate::probe::{ProbeOutcome, ProbeResult};
use crate::proxy::Channel;
use crate::reconcile::{Action, ApplyOutcome, ReconcileReport};

/// 按格式渲染机器可读的结果，文本格式返回 None
pub fn render(summary: &RunSummary, format: OutputFormat) -> anyhow::Result<Option<String>> {
    Ok(match format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(summary)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(summary)?),
    })
}

pub fn print_header(platform: &str) {
    println!("🚀 git 代理同步工具 v{}", env!("CARGO_PKG_VERSION"));
    println!("{:=<80}", "");
    println!("运行平台: {}", platform);
}

pub fn print_detected(detected: &DetectedProxies, verbose: bool) {
    println!("\n🔍 检测到的代理设置:");
    if detected.is_empty() {
        println!("  未检测到代理 - 将使用直连");
    }

    for channel in Channel::ALL {
        match detected.get(channel) {
            Some(endpoint) => println!(
                "  {} 代理: {} (来源: {})",
                channel.as_str().to_uppercase(),
                endpoint,
                detected.winning_source(channel).unwrap_or("未知")
            ),
            None => println!("  {} 代理: 未设置", channel.as_str().to_uppercase()),
        }

        if verbose {
            for record in detected.records_for(channel) {
                let outcome = match &record.outcome {
                    SourceOutcome::Found(endpoint) => format!("✅ {}", endpoint),
                    SourceOutcome::Absent => "—".to_string(),
                    SourceOutcome::Ignored(reason) => format!("⚠️  已忽略: {}", reason),
                };
                println!("      {:<22} {}", record.source, outcome);
            }
        }
    }
}

pub fn print_probe(probe: &ProbeResult) {
    println!("\n📡 连通性检测: {}", probe.target);
    if let Some(via) = &probe.via {
        println!("  经由代理: {}", via);
    }

    match &probe.outcome {
        ProbeOutcome::Reachable { status } => {
            println!(
                "  ✅ 连接成功，状态码 {} ({}ms)",
                status,
                probe.latency.as_millis()
            );
        }
        ProbeOutcome::Unreachable { reason } => {
            println!("  ❌ 连接失败: {}", reason);
            println!("  可能是网络问题或代理设置不正确");
        }
    }
}

pub fn print_reconcile(report: &ReconcileReport) {
    println!(
        "\n⚙️  同步 git 代理配置 ({}){}:",
        report.store,
        if report.dry_run { " [演练]" } else { "" }
    );

    for channel in &report.channels {
        let key = channel.channel.git_key();
        let action = match &channel.action {
            Action::Keep => "保持不变".to_string(),
            Action::Set(value) => format!("设置为 {}", value),
            Action::Unset => "清除".to_string(),
        };
        let outcome = match &channel.outcome {
            ApplyOutcome::NotNeeded => "✅".to_string(),
            ApplyOutcome::Applied => "✅ 已完成".to_string(),
            ApplyOutcome::Planned => "📝 计划中".to_string(),
            ApplyOutcome::Failed(reason) => format!("❌ 失败: {}", reason),
        };
        println!("  {}: {} {}", key, action, outcome);

        if let Some(error) = &channel.read_error {
            println!("    ⚠️  读取失败（按未设置处理）: {}", error);
        }
    }

    println!("\n当前 git 代理配置:");
    for channel in &report.channels {
        let label = channel.channel.as_str().to_uppercase();
        match (&channel.after, &channel.verify_error) {
            (_, Some(error)) => println!("  Git {} 代理: ⚠️  无法读取 ({})", label, error),
            (Some(value), None) => println!("  Git {} 代理: {}", label, value),
            (None, None) => println!("  Git {} 代理: 未设置", label),
        }
    }
}

pub fn print_summary(summary: &RunSummary) {
    let reconcile = &summary.reconcile;

    println!("\n{:=<80}", "");
    println!(
        "连通性: {}",
        if summary.is_success() {
            "✅ 正常"
        } else {
            "❌ 失败"
        }
    );
    println!(
        "git 配置: 写入 {} 项，清除 {} 项，失败 {} 项",
        reconcile.sets(),
        reconcile.unsets(),
        reconcile.failures()
    );
    if reconcile.has_issues() {
        println!("⚠️  部分 git 配置操作未成功，请检查上方的详细信息");
    }
}

pub fn print_text(summary: &RunSummary, verbose: bool) {
    print_header(&summary.platform);
    print_detected(&summary.detected, verbose);
    print_probe(&summary.probe);
    print_reconcile(&summary.reconcile);
    print_summary(summary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectedProxies;
    use crate::probe::ProbeResult;
    use crate::proxy::ProxyEndpoint;
    use crate::reconcile::ChannelReport;
    use std::time::Duration;

    fn summary() -> RunSummary {
        RunSummary {
            platform: "linux x86_64".to_string(),
            detected: DetectedProxies::new(ProxyEndpoint::new("http://p:8080"), None),
            probe: ProbeResult {
                target: "https://github.com".to_string(),
                via: None,
                outcome: ProbeOutcome::Unreachable {
                    reason: "连接失败: refused".to_string(),
                },
                latency: Duration::from_millis(12),
                checked_at: chrono::Utc::now(),
            },
            reconcile: ReconcileReport {
                store: "memory".to_string(),
                dry_run: false,
                channels: vec![ChannelReport {
                    channel: Channel::Http,
                    detected: Some("http://p:8080".to_string()),
                    before: None,
                    read_error: None,
                    action: Action::Set("http://p:8080".to_string()),
                    outcome: ApplyOutcome::Applied,
                    after: Some("http://p:8080".to_string()),
                    verify_error: None,
                }],
            },
        }
    }

    #[test]
    fn test_render_json() {
        let json = render(&summary(), OutputFormat::Json).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["detected"]["http"], "http://p:8080");
        assert!(value["detected"]["https"].is_null());
        assert_eq!(value["probe"]["outcome"]["kind"], "unreachable");
        assert_eq!(value["reconcile"]["channels"][0]["action"]["kind"], "set");
        assert_eq!(value["reconcile"]["channels"][0]["outcome"]["kind"], "applied");
    }

    #[test]
    fn test_render_yaml_and_text() {
        let yaml = render(&summary(), OutputFormat::Yaml).unwrap().unwrap();
        assert!(yaml.contains("platform: linux x86_64"));
        assert!(render(&summary(), OutputFormat::Text).unwrap().is_none());
    }
}
