//! SPL token 账户模型与临时账户工具。
//!
//! 原生 SOL 走包裹账户: 建号 + 注资 + 初始化进 setup 组，关闭进
//! cleanup 组，租金由付款人垫付并在关闭时收回。

use solana_sdk::account::Account;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_system_interface::instruction as system_instruction;
use tracing::debug;

use crate::cache::cached_associated_token_address;
use crate::chain::ChainReader;
use crate::consts::{SYSTEM_PROGRAM_ID, WSOL_MINT};
use crate::error::{Error, Result};
use crate::layout;

pub const TOKEN_ACCOUNT_SPAN: usize = 165;

const OFFSET_MINT: usize = 0;
const OFFSET_OWNER: usize = 32;
const OFFSET_AMOUNT: usize = 64;
const OFFSET_DELEGATE: usize = 72;
const OFFSET_STATE: usize = 108;
const OFFSET_IS_NATIVE: usize = 109;
const OFFSET_DELEGATED_AMOUNT: usize = 121;
const OFFSET_CLOSE_AUTHORITY: usize = 129;

/// 调用方持有的 token 账户句柄。包裹原生 SOL 时地址可以缺省，
/// 由编译器现场合成临时账户。
#[derive(Debug, Clone, Copy)]
pub struct TokenAccountHandle {
    pub pubkey: Option<Pubkey>,
    pub mint: Pubkey,
}

impl TokenAccountHandle {
    pub fn new(pubkey: Pubkey, mint: Pubkey) -> Self {
        Self {
            pubkey: Some(pubkey),
            mint,
        }
    }

    pub fn wrapped_native() -> Self {
        Self {
            pubkey: None,
            mint: WSOL_MINT,
        }
    }
}

/// 链上 token 账户的只读快照。
#[derive(Debug, Clone)]
pub struct TokenAccountState {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub state: u8,
    pub is_native: Option<u64>,
    pub delegated_amount: u64,
    pub close_authority: Option<Pubkey>,
}

pub fn decode_token_account(data: &[u8]) -> Result<TokenAccountState> {
    if data.len() < TOKEN_ACCOUNT_SPAN {
        return Err(Error::decode(format!(
            "token 账户数据长度不足: {} 字节",
            data.len()
        )));
    }
    let is_native = match layout::read_u32(data, OFFSET_IS_NATIVE)? {
        0 => None,
        1 => Some(layout::read_u64(data, OFFSET_IS_NATIVE + 4)?),
        other => {
            return Err(Error::decode(format!("无效的 isNative 标志: {other}")));
        }
    };
    Ok(TokenAccountState {
        mint: layout::read_pubkey(data, OFFSET_MINT)?,
        owner: layout::read_pubkey(data, OFFSET_OWNER)?,
        amount: layout::read_u64(data, OFFSET_AMOUNT)?,
        delegate: layout::read_coption_pubkey(data, OFFSET_DELEGATE)?,
        state: layout::read_u8(data, OFFSET_STATE)?,
        is_native,
        delegated_amount: layout::read_u64(data, OFFSET_DELEGATED_AMOUNT)?,
        close_authority: layout::read_coption_pubkey(data, OFFSET_CLOSE_AUTHORITY)?,
    })
}

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    cached_associated_token_address(owner, mint)
}

/// 幂等创建 ATA 的指令。
pub fn create_associated_token_account_instruction(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    let ata = cached_associated_token_address(owner, mint);
    Instruction {
        program_id: spl_associated_token_account::ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ],
        data: vec![1],
    }
}

pub fn close_token_account_instruction(account: &Pubkey, wallet: &Pubkey) -> Instruction {
    spl_token::instruction::close_account(&spl_token::ID, account, wallet, wallet, &[])
        .expect("close_account 指令构建失败")
}

/// 合成临时包裹 SOL 账户: 创建 + 注资 + 初始化，三条指令按序追加，
/// 新账户的 keypair 进入签名者列表。
pub async fn create_wrapped_native_account<C: ChainReader + ?Sized>(
    chain: &C,
    owner: &Pubkey,
    payer: &Pubkey,
    amount: u64,
    instructions: &mut Vec<Instruction>,
    signers: &mut Vec<Keypair>,
) -> Result<Pubkey> {
    let rent = chain
        .minimum_balance_for_rent_exemption(TOKEN_ACCOUNT_SPAN)
        .await?;
    let new_account = Keypair::new();
    let address = new_account.pubkey();

    instructions.push(system_instruction::create_account(
        payer,
        &address,
        rent,
        TOKEN_ACCOUNT_SPAN as u64,
        &spl_token::ID,
    ));
    if amount > 0 {
        instructions.push(system_instruction::transfer(payer, &address, amount));
    }
    instructions.push(
        spl_token::instruction::initialize_account(&spl_token::ID, &address, &WSOL_MINT, owner)
            .expect("initialize_account 指令构建失败"),
    );
    signers.push(new_account);

    debug!(target: "token", account = %address, amount, "合成临时 WSOL 账户");
    Ok(address)
}

/// 查找或创建 mint 对应的账户。包裹原生 SOL 始终走临时账户并把
/// 关闭指令记入 cleanup；其余 mint 复用既有 ATA，缺失时补建。
pub async fn find_or_create_token_account<C: ChainReader + ?Sized>(
    chain: &C,
    owner: &Pubkey,
    payer: &Pubkey,
    mint: &Pubkey,
    amount: u64,
    instructions: &mut Vec<Instruction>,
    signers: &mut Vec<Keypair>,
    clean_instructions: &mut Vec<Instruction>,
) -> Result<Pubkey> {
    if *mint == WSOL_MINT {
        let account =
            create_wrapped_native_account(chain, owner, payer, amount, instructions, signers)
                .await?;
        clean_instructions.push(close_token_account_instruction(&account, owner));
        return Ok(account);
    }

    let ata = cached_associated_token_address(owner, mint);
    if token_account_exists(chain.get_account(&ata).await?.as_ref()) {
        return Ok(ata);
    }

    instructions.push(create_associated_token_account_instruction(
        payer, owner, mint,
    ));
    Ok(ata)
}

fn token_account_exists(account: Option<&Account>) -> bool {
    account
        .map(|account| account.owner == spl_token::ID && !account.data.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account_bytes(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
        let mut data = vec![0u8; TOKEN_ACCOUNT_SPAN];
        layout::write_pubkey(mint, &mut data, OFFSET_MINT).unwrap();
        layout::write_pubkey(owner, &mut data, OFFSET_OWNER).unwrap();
        layout::write_u64(amount, &mut data, OFFSET_AMOUNT).unwrap();
        layout::write_u8(1, &mut data, OFFSET_STATE).unwrap();
        data
    }

    #[test]
    fn decode_initialized_account() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let state = decode_token_account(&sample_account_bytes(&mint, &owner, 777)).unwrap();
        assert_eq!(state.mint, mint);
        assert_eq!(state.owner, owner);
        assert_eq!(state.amount, 777);
        assert_eq!(state.delegate, None);
        assert_eq!(state.is_native, None);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let err = decode_token_account(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn ata_create_instruction_shape() {
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ix = create_associated_token_account_instruction(&payer, &owner, &mint);
        assert_eq!(ix.program_id, spl_associated_token_account::ID);
        assert_eq!(ix.accounts.len(), 6);
        assert_eq!(ix.accounts[0].pubkey, payer);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[1].pubkey, associated_token_address(&owner, &mint));
        assert_eq!(ix.data, vec![1]);
    }

    #[test]
    fn close_instruction_targets_wallet() {
        let account = Pubkey::new_unique();
        let wallet = Pubkey::new_unique();
        let ix = close_token_account_instruction(&account, &wallet);
        assert_eq!(ix.program_id, spl_token::ID);
        assert_eq!(ix.data, vec![9]);
        assert_eq!(ix.accounts[0].pubkey, account);
        assert_eq!(ix.accounts[1].pubkey, wallet);
    }
}
