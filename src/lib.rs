//! 多交易所兑换路由协议的客户端 SDK。
//!
//! 输入一条来自路由服务的 Distribution（单跳直达，或经一个中间资产
//! 的两跳间接兑换），产出按 setup / swap / cleanup 分组的协议指令，
//! 由调用方自行组装、签名并提交。另有一条把编译整体委托给路由服务
//! `/transactions` 端点的路径，两者等价并存。

pub mod api;
pub mod cache;
pub mod chain;
pub mod compiler;
pub mod consts;
pub mod error;
pub mod exchanges;
pub mod instructions;
pub mod layout;
pub mod swap_info;
pub mod token;

pub use api::{
    RawDistribution, RawRoute, RawTokenMint, RouterApiClient, RoutesRequest, TokenInfo,
    TokenRegistry, TransactionsRequest,
};
pub use chain::{AccountFilter, ChainReader};
pub use compiler::{
    ComposeParams, InstructionGroups, SwapCompiler, default_slippage, minimum_amount_out,
};
pub use error::{Error, Result};
pub use exchanges::{ExchangeModel, ExchangerKind, SwapOp};
pub use token::TokenAccountHandle;
