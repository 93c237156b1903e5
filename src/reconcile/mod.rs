//! 将检测结果同步到外部代理配置
//!
//! 每个通道独立执行 读取 → 决策 → 应用 → 复核，一个通道失败不影响另一个。

use crate::detect::DetectedProxies;
use crate::proxy::Channel;
use crate::store::ProxyConfigStore;
use serde::Serialize;

/// 决策结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Action {
    /// 已一致，无需改动
    Keep,
    /// 写入（覆盖）为检测到的值
    Set(String),
    /// 删除已有的值
    Unset,
}

impl Action {
    /// 由检测值与已保存值得出最小改动
    pub fn decide(detected: Option<&str>, persisted: Option<&str>) -> Self {
        match (detected, persisted) {
            (None, None) => Action::Keep,
            (None, Some(_)) => Action::Unset,
            (Some(detected), Some(persisted)) if detected == persisted => Action::Keep,
            (Some(detected), _) => Action::Set(detected.to_string()),
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Action::Keep)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "lowercase")]
pub enum ApplyOutcome {
    /// 无需改动
    NotNeeded,
    Applied,
    /// 演练模式，只记录计划
    Planned,
    Failed(String),
}

/// 单个通道的同步记录
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: Channel,
    pub detected: Option<String>,
    pub before: Option<String>,
    pub read_error: Option<String>,
    pub action: Action,
    pub outcome: ApplyOutcome,
    pub after: Option<String>,
    pub verify_error: Option<String>,
}

impl ChannelReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ApplyOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub store: String,
    pub dry_run: bool,
    pub channels: Vec<ChannelReport>,
}

impl ReconcileReport {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    fn count_applied(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.channels
            .iter()
            .filter(|c| c.outcome == ApplyOutcome::Applied && pred(&c.action))
            .count()
    }

    /// 成功写入的通道数
    pub fn sets(&self) -> usize {
        self.count_applied(|a| matches!(a, Action::Set(_)))
    }

    /// 成功删除的通道数
    pub fn unsets(&self) -> usize {
        self.count_applied(|a| matches!(a, Action::Unset))
    }

    pub fn failures(&self) -> usize {
        self.channels.iter().filter(|c| c.is_failed()).count()
    }

    pub fn has_issues(&self) -> bool {
        self.channels
            .iter()
            .any(|c| c.is_failed() || c.read_error.is_some() || c.verify_error.is_some())
    }
}

pub struct ConfigReconciler<'a> {
    store: &'a dyn ProxyConfigStore,
    dry_run: bool,
}

impl<'a> ConfigReconciler<'a> {
    pub fn new(store: &'a dyn ProxyConfigStore) -> Self {
        Self {
            store,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn reconcile(&self, detected: &DetectedProxies) -> ReconcileReport {
        let mut report = ReconcileReport {
            store: self.store.describe(),
            dry_run: self.dry_run,
            channels: Vec::with_capacity(Channel::ALL.len()),
        };

        for channel in Channel::ALL {
            let detected = detected.get(channel).map(|e| e.as_str());
            report
                .channels
                .push(self.reconcile_channel(channel, detected).await);
        }

        report
    }

    async fn reconcile_channel(&self, channel: Channel, detected: Option<&str>) -> ChannelReport {
        // 读取失败按“不存在”处理
        let (before, read_error) = match self.store.get(channel).await {
            Ok(value) => (value, None),
            Err(e) => {
                log::warn!("读取 {} 失败，按未设置处理: {}", channel.git_key(), e);
                (None, Some(e.to_string()))
            }
        };

        let action = Action::decide(detected, before.as_deref());

        let outcome = if !action.is_change() {
            log::debug!("{} 已是最新", channel.git_key());
            ApplyOutcome::NotNeeded
        } else if self.dry_run {
            log::info!("[演练] {} 将执行 {:?}", channel.git_key(), action);
            ApplyOutcome::Planned
        } else {
            self.apply(channel, &action).await
        };

        let (after, verify_error) = match self.store.get(channel).await {
            Ok(value) => (value, None),
            Err(e) => {
                log::warn!("复核 {} 失败: {}", channel.git_key(), e);
                (None, Some(e.to_string()))
            }
        };

        ChannelReport {
            channel,
            detected: detected.map(str::to_string),
            before,
            read_error,
            action,
            outcome,
            after,
            verify_error,
        }
    }

    async fn apply(&self, channel: Channel, action: &Action) -> ApplyOutcome {
        let result = match action {
            Action::Keep => return ApplyOutcome::NotNeeded,
            Action::Set(value) => {
                log::info!("设置 {} = {}", channel.git_key(), value);
                self.store.set(channel, value).await
            }
            Action::Unset => {
                log::info!("清除 {}", channel.git_key());
                self.store.unset(channel).await
            }
        };

        match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(e) => {
                log::warn!("更新 {} 失败: {}", channel.git_key(), e);
                ApplyOutcome::Failed(e.to_string())
            }
        }
    }
}
