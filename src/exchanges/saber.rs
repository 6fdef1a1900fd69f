//! saber 稳定币池账户模型。
//!
//! 管理费账户按兑换方向二选一: 源资产是 A 侧时收 B 侧管理费账户，
//! 反之收 A 侧。这是链上程序的既定行为，顺序不可调整。

use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::sysvar;
use tracing::debug;

use crate::chain::ChainReader;
use crate::error::{Error, Result};
use crate::layout;

pub const STABLE_SWAP_SPAN: usize = 395;

const OFFSET_IS_INITIALIZED: usize = 0;
const OFFSET_IS_PAUSED: usize = 1;
const OFFSET_NONCE: usize = 2;
const OFFSET_TOKEN_ACCOUNT_A: usize = 107;
const OFFSET_TOKEN_ACCOUNT_B: usize = 139;
const OFFSET_MINT_A: usize = 203;
const OFFSET_MINT_B: usize = 235;
const OFFSET_ADMIN_FEE_ACCOUNT_A: usize = 267;
const OFFSET_ADMIN_FEE_ACCOUNT_B: usize = 299;

#[derive(Debug, Clone)]
pub struct StableSwapPool {
    pub program_id: Pubkey,
    pub swap: Pubkey,
    pub authority: Pubkey,
    pub token_account_a: Pubkey,
    pub mint_a: Pubkey,
    pub admin_fee_account_a: Pubkey,
    pub token_account_b: Pubkey,
    pub mint_b: Pubkey,
    pub admin_fee_account_b: Pubkey,
}

impl StableSwapPool {
    pub async fn load<C: ChainReader + ?Sized>(
        chain: &C,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Self> {
        let account = chain
            .get_account(address)
            .await?
            .ok_or_else(|| Error::not_found(format!("saber 稳定池 {address}")))?;
        let pool = decode_stable_swap(address, program_id, &account.data)?;
        debug!(
            target: "exchange::saber",
            swap = %address,
            mint_a = %pool.mint_a,
            mint_b = %pool.mint_b,
            "已加载 saber 稳定池"
        );
        Ok(pool)
    }

    /// swap 指令的账户后缀，管理费账户随兑换方向切换。
    pub fn swap_keys(&self, source_mint: &Pubkey) -> Vec<AccountMeta> {
        let admin_fee_account = if *source_mint == self.mint_a {
            self.admin_fee_account_b
        } else {
            self.admin_fee_account_a
        };
        vec![
            AccountMeta::new_readonly(self.swap, false),
            AccountMeta::new_readonly(self.authority, false),
            AccountMeta::new(self.token_account_a, false),
            AccountMeta::new(self.token_account_b, false),
            AccountMeta::new(admin_fee_account, false),
            AccountMeta::new_readonly(sysvar::clock::ID, false),
            AccountMeta::new_readonly(self.program_id, false),
        ]
    }
}

pub fn decode_stable_swap(
    address: &Pubkey,
    program_id: &Pubkey,
    data: &[u8],
) -> Result<StableSwapPool> {
    if data.len() < STABLE_SWAP_SPAN {
        return Err(Error::decode(format!(
            "saber 稳定池 {address} 数据长度不足: {} 字节",
            data.len()
        )));
    }

    if !layout::read_bool(data, OFFSET_IS_INITIALIZED)? {
        return Err(Error::not_found(format!("saber 稳定池 {address} 未初始化")));
    }
    if layout::read_bool(data, OFFSET_IS_PAUSED)? {
        return Err(Error::not_found(format!("saber 稳定池 {address} 已暂停")));
    }

    let nonce = layout::read_u8(data, OFFSET_NONCE)?;
    let authority = Pubkey::create_program_address(&[address.as_ref(), &[nonce]], program_id)
        .map_err(|_| {
            Error::decode(format!(
                "saber 稳定池 {address} 的 authority 派生失败: nonce {nonce}"
            ))
        })?;

    Ok(StableSwapPool {
        program_id: *program_id,
        swap: *address,
        authority,
        token_account_a: layout::read_pubkey(data, OFFSET_TOKEN_ACCOUNT_A)?,
        mint_a: layout::read_pubkey(data, OFFSET_MINT_A)?,
        admin_fee_account_a: layout::read_pubkey(data, OFFSET_ADMIN_FEE_ACCOUNT_A)?,
        token_account_b: layout::read_pubkey(data, OFFSET_TOKEN_ACCOUNT_B)?,
        mint_b: layout::read_pubkey(data, OFFSET_MINT_B)?,
        admin_fee_account_b: layout::read_pubkey(data, OFFSET_ADMIN_FEE_ACCOUNT_B)?,
    })
}
