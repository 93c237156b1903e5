//! 外部代理配置存储
//!
//! 存储归外部工具所有，可能被其他进程同时修改；每次读写都是独立、可失败的操作。

mod git;
#[cfg(test)]
pub mod memory;

pub use git::{GitConfigStore, GitScope};

use crate::command::CommandError;
use crate::proxy::Channel;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{operation} {key} 失败 (退出码 {code:?}): {stderr}")]
    Rejected {
        operation: &'static str,
        key: String,
        code: Option<i32>,
        stderr: String,
    },
}

#[async_trait]
pub trait ProxyConfigStore: Send + Sync {
    /// 读取通道当前的代理值，键不存在时返回 Ok(None)
    async fn get(&self, channel: Channel) -> Result<Option<String>, StoreError>;

    /// 写入代理值，覆盖已有值
    async fn set(&self, channel: Channel, value: &str) -> Result<(), StoreError>;

    /// 删除代理值，键本来就不存在也算成功
    async fn unset(&self, channel: Channel) -> Result<(), StoreError>;

    /// 诊断输出中展示的存储位置
    fn describe(&self) -> String;
}
