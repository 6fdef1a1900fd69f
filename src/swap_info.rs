//! 协议自有的 swap info 账户: 两跳间接兑换用来传递中间资产状态的
//! 每用户暂存账户。

use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::chain::{AccountFilter, ChainReader};
use crate::error::{Error, Result};
use crate::layout;

pub const SWAP_INFO_SPAN: usize = 78;

const OFFSET_IS_INITIALIZED: usize = 0;
const OFFSET_STATUS: usize = 1;
const OFFSET_TOKEN_LATEST_AMOUNT: usize = 2;
const OFFSET_OWNER: usize = 10;
const OFFSET_TOKEN_ACCOUNT: usize = 42;

/// 账户状态标记，取值属于链上程序的冻结约定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    SwapInfo = 1,
    Closed = 3,
}

#[derive(Debug, Clone)]
pub struct SwapInfoAccount {
    pub pubkey: Pubkey,
    pub program_id: Pubkey,
    pub is_initialized: bool,
    pub status: u8,
    pub token_latest_amount: u64,
    pub owner: Pubkey,
    pub token_account: Option<Pubkey>,
}

pub fn decode_swap_info(
    pubkey: &Pubkey,
    program_id: &Pubkey,
    data: &[u8],
) -> Result<SwapInfoAccount> {
    if data.len() < SWAP_INFO_SPAN {
        return Err(Error::decode(format!(
            "swap info 账户 {pubkey} 数据长度不足: {} 字节",
            data.len()
        )));
    }
    Ok(SwapInfoAccount {
        pubkey: *pubkey,
        program_id: *program_id,
        is_initialized: layout::read_bool(data, OFFSET_IS_INITIALIZED)?,
        status: layout::read_u8(data, OFFSET_STATUS)?,
        token_latest_amount: layout::read_u64(data, OFFSET_TOKEN_LATEST_AMOUNT)?,
        owner: layout::read_pubkey(data, OFFSET_OWNER)?,
        token_account: layout::read_coption_pubkey(data, OFFSET_TOKEN_ACCOUNT)?,
    })
}

/// 按 owner 与已初始化标记过滤，地址无需事先知道。
pub fn swap_info_filters(owner: &Pubkey) -> Vec<AccountFilter> {
    vec![
        AccountFilter::DataSize(SWAP_INFO_SPAN as u64),
        AccountFilter::Memcmp {
            offset: OFFSET_IS_INITIALIZED,
            bytes: vec![1],
        },
        AccountFilter::Memcmp {
            offset: OFFSET_STATUS,
            bytes: vec![AccountStatus::SwapInfo as u8],
        },
        AccountFilter::Memcmp {
            offset: OFFSET_OWNER,
            bytes: owner.to_bytes().to_vec(),
        },
    ]
}

/// 查找 owner 名下既有的 swap info 账户，取第一个命中。
pub async fn find_swap_info<C: ChainReader + ?Sized>(
    chain: &C,
    program_id: &Pubkey,
    owner: &Pubkey,
) -> Result<Option<SwapInfoAccount>> {
    let accounts = chain
        .get_program_accounts(program_id, swap_info_filters(owner))
        .await?;
    let Some((pubkey, account)) = accounts.into_iter().next() else {
        return Ok(None);
    };
    let Account { data, owner: account_owner, .. } = account;
    let decoded = decode_swap_info(&pubkey, &account_owner, &data)?;
    debug!(
        target: "swap_info",
        account = %pubkey,
        owner = %owner,
        "检测到已存在的 swap info 账户"
    );
    Ok(Some(decoded))
}
