//! 路由服务 HTTP 客户端。
//!
//! 服务端负责报价与路径搜索，这里只消费结果。`/transactions` 是
//! 与本地编译并存的另一条构造路径，由部署方自行选择。

use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bincode::serde::decode_from_slice;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info};

use crate::consts::{CHAIN_ID, DEFAULT_ROUTER_BASE_URL};
use crate::error::{Error, Result};

pub mod serde_helpers;
pub mod types;

pub use types::{
    RawDistribution, RawRoute, RawTokenMint, RoutesRequest, RoutesResponse, TokenInfo,
    TokenListResponse, TokenRegistry, TransactionsRequest, TransactionsResponse,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct RouterApiClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl Default for RouterApiClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_ROUTER_BASE_URL.to_string())
    }
}

impl RouterApiClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            base_url,
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// 拉取 token 列表，含各资产的协议收费账户。
    pub async fn token_list(&self) -> Result<TokenRegistry> {
        let url = self.endpoint(&format!("/token-list?chain_id={CHAIN_ID}"));
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::ApiStatus {
                endpoint: url,
                status: response.status(),
            });
        }

        let payload: TokenListResponse = response.json().await?;
        let registry = TokenRegistry::from_tokens(payload.tokens);
        info!(
            target: "api::router",
            tokens = registry.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "token 列表拉取完成"
        );
        Ok(registry)
    }

    /// 请求候选路由。
    pub async fn routes(&self, request: &RoutesRequest) -> Result<Vec<RawDistribution>> {
        let url = self.endpoint("/routes");
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::ApiStatus {
                endpoint: url,
                status: response.status(),
            });
        }

        let payload: RoutesResponse = response.json().await?;
        info!(
            target: "api::router",
            amount_in = request.amount_in,
            source = %request.source_token_mint_key,
            destination = %request.destination_token_mint_key,
            distributions = payload.distributions.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "路由请求完成"
        );
        Ok(payload.distributions)
    }

    /// 服务端编译路径: 直接取回 base64 交易。
    pub async fn transactions(
        &self,
        request: &TransactionsRequest,
    ) -> Result<Vec<VersionedTransaction>> {
        let url = self.endpoint("/transactions");
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::ApiStatus {
                endpoint: url,
                status: response.status(),
            });
        }

        let payload: TransactionsResponse = response.json().await?;
        let transactions = payload
            .transactions
            .iter()
            .map(|encoded| decode_base64_transaction(encoded))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            target: "api::router",
            transactions = transactions.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "服务端编译交易拉取完成"
        );
        Ok(transactions)
    }
}

/// 解码服务端返回的 base64 交易。
pub fn decode_base64_transaction(encoded: &str) -> Result<VersionedTransaction> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|err| Error::ApiSchema(format!("base64 解码失败: {err}")))?;
    let (tx, _) = decode_from_slice::<VersionedTransaction, _>(&bytes, bincode_config())
        .map_err(|err| Error::ApiSchema(format!("bincode 解码失败: {err}")))?;
    Ok(tx)
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}
