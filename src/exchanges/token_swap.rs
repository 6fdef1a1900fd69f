//! token-swap 池账户模型（SplTokenSwap / Orca / OneMoon 共用布局）。

use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::chain::ChainReader;
use crate::error::{Error, Result};
use crate::layout;

pub const TOKEN_SWAP_POOL_SPAN: usize = 324;

const OFFSET_VERSION: usize = 0;
const OFFSET_IS_INITIALIZED: usize = 1;
const OFFSET_BUMP_SEED: usize = 2;
const OFFSET_TOKEN_PROGRAM_ID: usize = 3;
const OFFSET_TOKEN_ACCOUNT_A: usize = 35;
const OFFSET_TOKEN_ACCOUNT_B: usize = 67;
const OFFSET_POOL_MINT: usize = 99;
const OFFSET_MINT_A: usize = 131;
const OFFSET_MINT_B: usize = 163;
const OFFSET_FEE_ACCOUNT: usize = 195;

#[derive(Debug, Clone)]
pub struct TokenSwapPool {
    pub program_id: Pubkey,
    pub pubkey: Pubkey,
    pub authority: Pubkey,
    pub token_account_a: Pubkey,
    pub token_account_b: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub pool_mint: Pubkey,
    pub fee_account: Pubkey,
}

impl TokenSwapPool {
    pub async fn load<C: ChainReader + ?Sized>(
        chain: &C,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Self> {
        let account = chain
            .get_account(address)
            .await?
            .ok_or_else(|| Error::not_found(format!("token-swap 池 {address}")))?;
        let pool = decode_token_swap_pool(address, program_id, &account.data)?;
        debug!(
            target: "exchange::token_swap",
            pool = %address,
            mint_a = %pool.mint_a,
            mint_b = %pool.mint_b,
            "已加载 token-swap 池"
        );
        Ok(pool)
    }

    /// swap 指令的账户后缀，顺序为外部 ABI 固定。
    pub fn swap_keys(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(self.pubkey, false),
            AccountMeta::new_readonly(self.authority, false),
            AccountMeta::new(self.token_account_a, false),
            AccountMeta::new(self.token_account_b, false),
            AccountMeta::new(self.pool_mint, false),
            AccountMeta::new(self.fee_account, false),
            AccountMeta::new_readonly(self.program_id, false),
        ]
    }
}

pub fn decode_token_swap_pool(
    address: &Pubkey,
    program_id: &Pubkey,
    data: &[u8],
) -> Result<TokenSwapPool> {
    if data.len() < TOKEN_SWAP_POOL_SPAN {
        return Err(Error::decode(format!(
            "token-swap 池 {address} 数据长度不足: {} 字节",
            data.len()
        )));
    }

    let _version = layout::read_u8(data, OFFSET_VERSION)?;
    if !layout::read_bool(data, OFFSET_IS_INITIALIZED)? {
        return Err(Error::decode(format!("token-swap 池 {address} 未初始化")));
    }

    let bump_seed = layout::read_u8(data, OFFSET_BUMP_SEED)?;
    let authority = Pubkey::create_program_address(&[address.as_ref(), &[bump_seed]], program_id)
        .map_err(|_| {
        Error::decode(format!(
            "token-swap 池 {address} 的 authority 派生失败: bump {bump_seed}"
        ))
    })?;
    let _token_program = layout::read_pubkey(data, OFFSET_TOKEN_PROGRAM_ID)?;

    Ok(TokenSwapPool {
        program_id: *program_id,
        pubkey: *address,
        authority,
        token_account_a: layout::read_pubkey(data, OFFSET_TOKEN_ACCOUNT_A)?,
        token_account_b: layout::read_pubkey(data, OFFSET_TOKEN_ACCOUNT_B)?,
        mint_a: layout::read_pubkey(data, OFFSET_MINT_A)?,
        mint_b: layout::read_pubkey(data, OFFSET_MINT_B)?,
        pool_mint: layout::read_pubkey(data, OFFSET_POOL_MINT)?,
        fee_account: layout::read_pubkey(data, OFFSET_FEE_ACCOUNT)?,
    })
}
