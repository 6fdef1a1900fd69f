//! 链上只读访问的抽象层。
//!
//! 编译器只依赖这三个读取能力，便于在测试里注入可计数的 mock，
//! 生产环境直接挂在 nonblocking [`RpcClient`] 上。

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use crate::error::Result;

/// getProgramAccounts 使用的字节级过滤条件。
#[derive(Debug, Clone)]
pub enum AccountFilter {
    DataSize(u64),
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    fn into_rpc_filter(self) -> RpcFilterType {
        match self {
            AccountFilter::DataSize(size) => RpcFilterType::DataSize(size),
            AccountFilter::Memcmp { offset, bytes } => {
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(offset, bytes))
            }
        }
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// 账户不存在时返回 `None`，网络失败向上传播。
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<(Pubkey, Account)>>;

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64>;
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        let response = self
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?;
        Ok(response.value)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<(Pubkey, Account)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(
                filters
                    .into_iter()
                    .map(AccountFilter::into_rpc_filter)
                    .collect(),
            ),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: None,
                commitment: Some(CommitmentConfig::confirmed()),
                min_context_slot: None,
            },
            with_context: Some(false),
            sort_results: None,
        };
        Ok(self
            .get_program_accounts_with_config(program_id, config)
            .await?)
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        Ok(self.get_minimum_balance_for_rent_exemption(data_len).await?)
    }
}
