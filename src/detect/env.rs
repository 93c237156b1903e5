use super::{ProxySource, SourceOutcome};
use crate::proxy::{Channel, ProxyEndpoint};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// 只读的键值环境，检测器通过它读取环境变量，测试中可替换为固定映射
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// 当前进程的环境变量
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarCase {
    Lower,
    Upper,
}

/// `<channel>_proxy` / `<CHANNEL>_PROXY` 环境变量来源
pub struct EnvVarSource {
    env: Arc<dyn EnvSource>,
    case: VarCase,
}

impl EnvVarSource {
    pub fn new(env: Arc<dyn EnvSource>, case: VarCase) -> Self {
        Self { env, case }
    }

    fn var_name(&self, channel: Channel) -> &'static str {
        match self.case {
            VarCase::Lower => channel.env_var_lower(),
            VarCase::Upper => channel.env_var_upper(),
        }
    }
}

#[async_trait]
impl ProxySource for EnvVarSource {
    fn name(&self) -> &'static str {
        match self.case {
            VarCase::Lower => "env (lowercase)",
            VarCase::Upper => "env (uppercase)",
        }
    }

    fn describe(&self, channel: Channel) -> String {
        format!("env:{}", self.var_name(channel))
    }

    async fn lookup(&self, channel: Channel) -> SourceOutcome {
        self.env
            .var(self.var_name(channel))
            .and_then(|value| ProxyEndpoint::new(&value))
            .into()
    }
}
