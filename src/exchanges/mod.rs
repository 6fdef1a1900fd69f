//! 各交易所的链上账户模型。
//!
//! 每种交易所有自己的定长账户布局与 swap 指令账户序列，统一收敛到
//! [`ExchangeModel`] 这一个分发点。账户序列的顺序是外部 ABI 的一部分，
//! 逐字节固定，对应的黄金用例在各自模块内。

use serde::{Deserialize, Serialize};
use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

use crate::chain::ChainReader;
use crate::error::{Error, Result};

pub mod raydium;
pub mod saber;
pub mod serum;
pub mod token_swap;

pub use raydium::RaydiumAmm;
pub use saber::StableSwapPool;
pub use serum::{OpenOrdersAccount, SerumMarket};
pub use token_swap::TokenSwapPool;

/// 路由服务使用的交易所标签。Orca 与 OneMoon 是 token-swap 布局的
/// 独立部署，共用同一套模型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangerKind {
    #[serde(rename = "SplTokenSwap")]
    SplTokenSwap,
    #[serde(rename = "OrcaSwap")]
    OrcaSwap,
    #[serde(rename = "OneMoon")]
    OneMoon,
    #[serde(rename = "SerumDex")]
    SerumDex,
    #[serde(rename = "SaberStableSwap")]
    SaberStableSwap,
    #[serde(rename = "Raydium")]
    Raydium,
}

/// 按账户布局归并后的交易所族。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeFamily {
    TokenSwap,
    SerumDex,
    SaberStableSwap,
    Raydium,
}

impl ExchangerKind {
    pub fn family(self) -> ExchangeFamily {
        match self {
            ExchangerKind::SplTokenSwap | ExchangerKind::OrcaSwap | ExchangerKind::OneMoon => {
                ExchangeFamily::TokenSwap
            }
            ExchangerKind::SerumDex => ExchangeFamily::SerumDex,
            ExchangerKind::SaberStableSwap => ExchangeFamily::SaberStableSwap,
            ExchangerKind::Raydium => ExchangeFamily::Raydium,
        }
    }
}

/// swap 指令的三种形态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOp {
    /// 单跳直达，携带完整的输入与滑点下限。
    Swap,
    /// 间接路由第一腿，只带输入量，结果写入 swap info。
    SwapIn,
    /// 间接路由第二腿，读取 swap info 并校验输出下限。
    SwapOut,
}

/// 一次编译内某条腿加载完成的账户模型快照。只读、不缓存，
/// 读取与交易执行之间的过期由链上程序自行复核。
#[derive(Debug, Clone)]
pub enum ExchangeModel {
    TokenSwap(TokenSwapPool),
    SerumDex(SerumMarket),
    SaberStableSwap(StableSwapPool),
    Raydium(RaydiumAmm),
}

impl ExchangeModel {
    /// 按交易所标签加载对应账户模型。
    pub async fn load<C: ChainReader + ?Sized>(
        chain: &C,
        kind: ExchangerKind,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Self> {
        match kind.family() {
            ExchangeFamily::TokenSwap => Ok(ExchangeModel::TokenSwap(
                TokenSwapPool::load(chain, address, program_id).await?,
            )),
            ExchangeFamily::SerumDex => Ok(ExchangeModel::SerumDex(
                SerumMarket::load(chain, address, program_id).await?,
            )),
            ExchangeFamily::SaberStableSwap => Ok(ExchangeModel::SaberStableSwap(
                StableSwapPool::load(chain, address, program_id).await?,
            )),
            ExchangeFamily::Raydium => Ok(ExchangeModel::Raydium(
                RaydiumAmm::load(chain, address, program_id).await?,
            )),
        }
    }

    /// 指令 opcode，取值是冻结的外部约定。
    pub fn opcode(&self, op: SwapOp) -> u8 {
        match (self, op) {
            (ExchangeModel::TokenSwap(_), SwapOp::Swap) => 3,
            (ExchangeModel::TokenSwap(_), SwapOp::SwapIn) => 12,
            (ExchangeModel::TokenSwap(_), SwapOp::SwapOut) => 13,
            (ExchangeModel::SerumDex(_), SwapOp::Swap) => 4,
            (ExchangeModel::SerumDex(_), SwapOp::SwapIn) => 14,
            (ExchangeModel::SerumDex(_), SwapOp::SwapOut) => 15,
            (ExchangeModel::SaberStableSwap(_), SwapOp::Swap) => 6,
            (ExchangeModel::SaberStableSwap(_), SwapOp::SwapIn) => 16,
            (ExchangeModel::SaberStableSwap(_), SwapOp::SwapOut) => 17,
            (ExchangeModel::Raydium(_), SwapOp::Swap) => 9,
            (ExchangeModel::Raydium(_), SwapOp::SwapIn) => 18,
            (ExchangeModel::Raydium(_), SwapOp::SwapOut) => 19,
        }
    }

    /// 生成交易所专属的账户后缀。serum 市场必须先备好 open orders。
    pub fn swap_keys(
        &self,
        source_mint: &Pubkey,
        open_orders: Option<&Pubkey>,
    ) -> Result<Vec<AccountMeta>> {
        match self {
            ExchangeModel::TokenSwap(pool) => Ok(pool.swap_keys()),
            ExchangeModel::SerumDex(market) => {
                let open_orders = open_orders.ok_or_else(|| {
                    Error::validation("serum 市场缺少 open orders 账户".to_string())
                })?;
                Ok(market.swap_keys(open_orders))
            }
            ExchangeModel::SaberStableSwap(pool) => Ok(pool.swap_keys(source_mint)),
            ExchangeModel::Raydium(amm) => Ok(amm.swap_keys()),
        }
    }

    pub fn serum_market(&self) -> Option<&SerumMarket> {
        match self {
            ExchangeModel::SerumDex(market) => Some(market),
            _ => None,
        }
    }
}
