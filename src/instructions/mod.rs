//! 聚合协议指令编码。
//!
//! 指令数据为 `[opcode] + 若干小端 u64 参数`，账户序列为跨交易所
//! 公共前缀加上交易所专属后缀。opcode 与序列都是冻结的外部 ABI。

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::error::Result;
use crate::exchanges::{ExchangeModel, RaydiumAmm, SwapOp};

pub const OPCODE_INIT_SWAP_INFO: u8 = 10;
pub const OPCODE_SET_SWAP_INFO: u8 = 11;
pub const OPCODE_RAYDIUM_SWAP_IN2: u8 = 20;
pub const OPCODE_RAYDIUM_SWAP_OUT2: u8 = 21;

/// 兑换数额。所有值均为资产最小单位的无符号整数，
/// `minimum_amount_out` 由上游按滑点预先算好。
#[derive(Debug, Clone, Copy)]
pub struct SwapAmounts {
    pub amount_in: u64,
    pub expect_amount_out: u64,
    pub minimum_amount_out: u64,
}

/// 一条腿上与交易所无关的账户上下文。
#[derive(Debug, Clone, Copy)]
pub struct SwapLegKeys<'a> {
    pub source_token_account: &'a Pubkey,
    pub destination_token_account: &'a Pubkey,
    pub wallet: &'a Pubkey,
    pub source_mint: &'a Pubkey,
    pub open_orders: Option<&'a Pubkey>,
}

fn payload(opcode: u8, amounts: &[u64]) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + amounts.len() * 8);
    data.push(opcode);
    for amount in amounts {
        data.extend_from_slice(&amount.to_le_bytes());
    }
    data
}

/// 直达 swap: 完整携带输入量与输出上下限。
pub fn direct_swap_instruction(
    program_id: &Pubkey,
    model: &ExchangeModel,
    keys: &SwapLegKeys<'_>,
    fee_token_account: &Pubkey,
    amounts: &SwapAmounts,
) -> Result<Instruction> {
    let mut accounts = vec![
        AccountMeta::new(*keys.source_token_account, false),
        AccountMeta::new(*keys.destination_token_account, false),
        AccountMeta::new_readonly(*keys.wallet, true),
        AccountMeta::new_readonly(spl_token::ID, false),
        AccountMeta::new(*fee_token_account, false),
    ];
    accounts.extend(model.swap_keys(keys.source_mint, keys.open_orders)?);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: payload(
            model.opcode(SwapOp::Swap),
            &[
                amounts.amount_in,
                amounts.expect_amount_out,
                amounts.minimum_amount_out,
            ],
        ),
    })
}

/// 间接路由第一腿: 只带输入量，产出记入 swap info。
pub fn swap_in_instruction(
    program_id: &Pubkey,
    model: &ExchangeModel,
    keys: &SwapLegKeys<'_>,
    swap_info: &Pubkey,
    amount_in: u64,
) -> Result<Instruction> {
    let mut accounts = vec![
        AccountMeta::new(*keys.source_token_account, false),
        AccountMeta::new(*keys.destination_token_account, false),
        AccountMeta::new_readonly(*keys.wallet, true),
        AccountMeta::new(*swap_info, false),
        AccountMeta::new_readonly(spl_token::ID, false),
    ];
    accounts.extend(model.swap_keys(keys.source_mint, keys.open_orders)?);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: payload(model.opcode(SwapOp::SwapIn), &[amount_in]),
    })
}

/// 间接路由第二腿: 读取 swap info，校验输出下限并结算协议费。
pub fn swap_out_instruction(
    program_id: &Pubkey,
    model: &ExchangeModel,
    keys: &SwapLegKeys<'_>,
    swap_info: &Pubkey,
    fee_token_account: &Pubkey,
    expect_amount_out: u64,
    minimum_amount_out: u64,
) -> Result<Instruction> {
    let mut accounts = vec![
        AccountMeta::new(*keys.source_token_account, false),
        AccountMeta::new(*keys.destination_token_account, false),
        AccountMeta::new_readonly(*keys.wallet, true),
        AccountMeta::new(*swap_info, false),
        AccountMeta::new_readonly(spl_token::ID, false),
        AccountMeta::new(*fee_token_account, false),
    ];
    accounts.extend(model.swap_keys(keys.source_mint, keys.open_orders)?);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: payload(
            model.opcode(SwapOp::SwapOut),
            &[expect_amount_out, minimum_amount_out],
        ),
    })
}

/// raydium 替代账户形态的第一腿（opcode 20，不带 target_orders）。
pub fn raydium_swap_in2_instruction(
    program_id: &Pubkey,
    amm: &RaydiumAmm,
    keys: &SwapLegKeys<'_>,
    swap_info: &Pubkey,
    amount_in: u64,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(*keys.source_token_account, false),
        AccountMeta::new(*keys.destination_token_account, false),
        AccountMeta::new_readonly(*keys.wallet, true),
        AccountMeta::new(*swap_info, false),
        AccountMeta::new_readonly(spl_token::ID, false),
    ];
    accounts.extend(amm.alt_swap_keys());

    Instruction {
        program_id: *program_id,
        accounts,
        data: payload(OPCODE_RAYDIUM_SWAP_IN2, &[amount_in]),
    }
}

/// raydium 替代账户形态的第二腿（opcode 21，数据只带输出下限）。
pub fn raydium_swap_out2_instruction(
    program_id: &Pubkey,
    amm: &RaydiumAmm,
    keys: &SwapLegKeys<'_>,
    swap_info: &Pubkey,
    fee_token_account: &Pubkey,
    minimum_amount_out: u64,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(*keys.source_token_account, false),
        AccountMeta::new(*keys.destination_token_account, false),
        AccountMeta::new_readonly(*keys.wallet, true),
        AccountMeta::new(*swap_info, false),
        AccountMeta::new_readonly(spl_token::ID, false),
        AccountMeta::new(*fee_token_account, false),
    ];
    accounts.extend(amm.alt_swap_keys());

    Instruction {
        program_id: *program_id,
        accounts,
        data: payload(OPCODE_RAYDIUM_SWAP_OUT2, &[minimum_amount_out]),
    }
}

/// 初始化新建的 swap info 账户。新账户与 owner 都要签名。
pub fn init_swap_info_instruction(
    program_id: &Pubkey,
    swap_info: &Pubkey,
    owner: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*swap_info, true),
            AccountMeta::new_readonly(*owner, true),
        ],
        data: payload(OPCODE_INIT_SWAP_INFO, &[]),
    }
}

/// 把 swap info 绑定到本次兑换的中间 token 账户。
pub fn set_swap_info_instruction(
    program_id: &Pubkey,
    swap_info: &Pubkey,
    token_account: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*swap_info, false),
            AccountMeta::new(*token_account, false),
        ],
        data: payload(OPCODE_SET_SWAP_INFO, &[]),
    }
}
