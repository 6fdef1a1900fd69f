//! 路由服务的请求与响应模型。
//!
//! 路由本身由外部服务计算，这里只做只读消费；字段名与服务端 JSON
//! 保持一致。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::api::serde_helpers::{field_as_string, option_field_as_string};
use crate::exchanges::ExchangerKind;

/// 路由中资产的标识: mint 地址加精度。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawTokenMint {
    pub decimals: u8,
    #[serde(with = "field_as_string")]
    pub pubkey: Pubkey,
}

/// 一条腿: 经由一个交易所池子/市场的单跳兑换。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRoute {
    pub source_token_mint: RawTokenMint,
    pub destination_token_mint: RawTokenMint,
    pub amount_in: u64,
    pub amount_out: u64,
    pub exchanger_flag: ExchangerKind,
    #[serde(with = "field_as_string")]
    pub pubkey: Pubkey,
    #[serde(with = "field_as_string")]
    pub program_id: Pubkey,
}

/// 一个完整的路由方案。`routes` 外层是跳，内层是同一跳的并行腿。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDistribution {
    pub routes: Vec<Vec<RawRoute>>,
    #[serde(default)]
    pub split_tx: bool,
    pub source_token_mint: RawTokenMint,
    pub destination_token_mint: RawTokenMint,
    pub amount_in: u64,
    pub amount_out: u64,
    #[serde(default)]
    pub exchanger_flag: Option<String>,
}

/// `POST /routes` 请求体。
#[derive(Debug, Clone, Serialize)]
pub struct RoutesRequest {
    pub amount_in: u64,
    #[serde(with = "field_as_string")]
    pub source_token_mint_key: Pubkey,
    #[serde(with = "field_as_string")]
    pub destination_token_mint_key: Pubkey,
    pub programs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_direct: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bridge_mints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
}

impl RoutesRequest {
    pub fn new(amount_in: u64, source_mint: Pubkey, destination_mint: Pubkey) -> Self {
        Self {
            amount_in,
            source_token_mint_key: source_mint,
            destination_token_mint_key: destination_mint,
            programs: crate::consts::SUPPORTED_PROGRAM_IDS
                .iter()
                .map(Pubkey::to_string)
                .collect(),
            size: None,
            only_direct: None,
            bridge_mints: Vec::new(),
            experiment: None,
        }
    }

    pub fn with_programs(mut self, programs: &[Pubkey]) -> Self {
        self.programs = programs.iter().map(Pubkey::to_string).collect();
        self
    }

    pub fn with_bridge_mints(mut self, mints: &[Pubkey]) -> Self {
        self.bridge_mints = mints.iter().map(Pubkey::to_string).collect();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutesResponse {
    pub distributions: Vec<RawDistribution>,
}

/// `POST /transactions` 请求体: 把编译整体委托给服务端的另一条路径。
#[derive(Debug, Clone, Serialize)]
pub struct TransactionsRequest {
    pub route: RawDistribution,
    pub minimum_amount_out: u64,
    #[serde(with = "field_as_string")]
    pub wallet: Pubkey,
    #[serde(with = "option_field_as_string", skip_serializing_if = "Option::is_none")]
    pub swap_info: Option<Pubkey>,
    #[serde(with = "option_field_as_string", skip_serializing_if = "Option::is_none")]
    pub source_token_account: Option<Pubkey>,
    #[serde(with = "option_field_as_string", skip_serializing_if = "Option::is_none")]
    pub destination_token_account: Option<Pubkey>,
    #[serde(with = "option_field_as_string", skip_serializing_if = "Option::is_none")]
    pub bridge_token_account: Option<Pubkey>,
    /// 市场地址 → open orders 地址。
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub open_orders: HashMap<String, String>,
}

impl TransactionsRequest {
    pub fn new(route: RawDistribution, minimum_amount_out: u64, wallet: Pubkey) -> Self {
        Self {
            route,
            minimum_amount_out,
            wallet,
            swap_info: None,
            source_token_account: None,
            destination_token_account: None,
            bridge_token_account: None,
            open_orders: HashMap::new(),
        }
    }

    pub fn insert_open_orders(&mut self, market: &Pubkey, open_orders: &Pubkey) {
        self.open_orders
            .insert(market.to_string(), open_orders.to_string());
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<String>,
}

/// token-list 条目。fee_account 是协议在该资产上的收费账户。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    #[serde(with = "field_as_string")]
    pub address: Pubkey,
    pub decimals: u8,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "option_field_as_string")]
    pub fee_account: Option<Pubkey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenListResponse {
    pub tokens: Vec<TokenInfo>,
}

/// mint → token 信息的内存索引。
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<Pubkey, TokenInfo>,
}

impl TokenRegistry {
    pub fn from_tokens(tokens: Vec<TokenInfo>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|token| (token.address, token))
                .collect(),
        }
    }

    pub fn get(&self, mint: &Pubkey) -> Option<&TokenInfo> {
        self.tokens.get(mint)
    }

    pub fn fee_token_account(&self, mint: &Pubkey) -> Option<Pubkey> {
        self.tokens.get(mint).and_then(|token| token.fee_account)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
