//! 测试用的内存存储，可按通道与操作注入失败

use super::{ProxyConfigStore, StoreError};
use crate::proxy::Channel;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Set,
    Unset,
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<Channel, String>>,
    failures: Mutex<HashSet<(Channel, Op)>>,
    writes: Mutex<Vec<(Channel, Op)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, channel: Channel, value: &str) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(channel, value.to_string());
        self
    }

    pub fn fail_on(self, channel: Channel, op: Op) -> Self {
        self.failures.lock().unwrap().insert((channel, op));
        self
    }

    pub fn value(&self, channel: Channel) -> Option<String> {
        self.values.lock().unwrap().get(&channel).cloned()
    }

    /// 已执行的写入/删除操作（含成功与注入失败的）
    pub fn writes(&self) -> Vec<(Channel, Op)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    fn check(&self, channel: Channel, op: Op) -> Result<(), StoreError> {
        if self.failures.lock().unwrap().contains(&(channel, op)) {
            return Err(StoreError::Rejected {
                operation: match op {
                    Op::Get => "get",
                    Op::Set => "set",
                    Op::Unset => "unset",
                },
                key: channel.git_key().to_string(),
                code: Some(255),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProxyConfigStore for MemoryStore {
    async fn get(&self, channel: Channel) -> Result<Option<String>, StoreError> {
        self.check(channel, Op::Get)?;
        Ok(self.value(channel))
    }

    async fn set(&self, channel: Channel, value: &str) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push((channel, Op::Set));
        self.check(channel, Op::Set)?;
        self.values
            .lock()
            .unwrap()
            .insert(channel, value.to_string());
        Ok(())
    }

    async fn unset(&self, channel: Channel) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push((channel, Op::Unset));
        self.check(channel, Op::Unset)?;
        self.values.lock().unwrap().remove(&channel);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
