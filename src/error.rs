use thiserror::Error;

use crate::layout::LayoutError;

/// SDK 统一错误分类。编译过程中任何一步失败都会立刻向调用方传播，
/// 已经产出的指令分组必须整体丢弃。
#[derive(Debug, Error)]
pub enum Error {
    /// 调用方入参未通过前置校验，发生在任何链上读取之前。
    #[error("路由校验失败: {0}")]
    Validation(String),

    /// 仅支持 1 跳或 2 跳路由。
    #[error("不支持的路由跳数: {hops}")]
    UnsupportedRoute { hops: usize },

    /// 预期存在的链上账户缺失，调用方可在前置交易确认后重试。
    #[error("链上账户不存在: {0}")]
    NotFound(String),

    /// 链上数据与既定布局不一致，说明程序或版本不匹配，不可重试。
    #[error("账户数据解析失败: {0}")]
    Decode(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("RPC 请求失败")]
    Rpc(#[from] solana_client::client_error::ClientError),

    #[error("路由服务请求失败")]
    Api(#[from] reqwest::Error),

    #[error("路由服务返回异常状态 {status}: {endpoint}")]
    ApiStatus {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("路由服务响应解析失败: {0}")]
    ApiSchema(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Error::Decode(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }
}
