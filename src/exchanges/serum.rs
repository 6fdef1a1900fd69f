//! serum 订单簿市场与 open orders 账户模型。
//!
//! 市场账户带 5 字节头部与 7 字节尾部填充，账户标志是 u64 位图。
//! vault signer 由市场地址加上存储的 nonce 派生，算法必须与链上
//! 程序一致。

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::sysvar;
use tracing::debug;

use crate::chain::{AccountFilter, ChainReader};
use crate::error::{Error, Result};
use crate::layout;

pub const MARKET_STATE_SPAN: usize = 388;
pub const OPEN_ORDERS_SPAN: usize = 3228;

const FLAG_INITIALIZED: u64 = 1 << 0;
const FLAG_MARKET: u64 = 1 << 1;
const FLAG_OPEN_ORDERS: u64 = 1 << 2;

const OFFSET_ACCOUNT_FLAGS: usize = 5;
const OFFSET_OWN_ADDRESS: usize = 13;
const OFFSET_VAULT_SIGNER_NONCE: usize = 45;
const OFFSET_BASE_MINT: usize = 53;
const OFFSET_QUOTE_MINT: usize = 85;
const OFFSET_BASE_VAULT: usize = 117;
const OFFSET_QUOTE_VAULT: usize = 165;
const OFFSET_REQUEST_QUEUE: usize = 221;
const OFFSET_EVENT_QUEUE: usize = 253;
const OFFSET_BIDS: usize = 285;
const OFFSET_ASKS: usize = 317;

pub const OPEN_ORDERS_OFFSET_MARKET: usize = 13;
pub const OPEN_ORDERS_OFFSET_OWNER: usize = 45;
const OPEN_ORDERS_OFFSET_BASE_FREE: usize = 77;
const OPEN_ORDERS_OFFSET_BASE_TOTAL: usize = 85;
const OPEN_ORDERS_OFFSET_QUOTE_FREE: usize = 93;
const OPEN_ORDERS_OFFSET_QUOTE_TOTAL: usize = 101;
const OPEN_ORDERS_OFFSET_FREE_SLOT_BITS: usize = 109;
const OPEN_ORDERS_OFFSET_IS_BID_BITS: usize = 125;

#[derive(Debug, Clone)]
pub struct SerumMarket {
    pub program_id: Pubkey,
    pub market: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub request_queue: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub vault_signer: Pubkey,
    pub vault_signer_nonce: u64,
}

impl SerumMarket {
    pub async fn load<C: ChainReader + ?Sized>(
        chain: &C,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Self> {
        let account = chain
            .get_account(address)
            .await?
            .ok_or_else(|| Error::not_found(format!("serum 市场 {address}")))?;
        let market = decode_market(address, program_id, &account.data)?;
        debug!(
            target: "exchange::serum",
            market = %address,
            vault_signer = %market.vault_signer,
            "已加载 serum 市场"
        );
        Ok(market)
    }

    /// swap 指令的账户后缀。open orders 必须已经存在或同批创建。
    pub fn swap_keys(&self, open_orders: &Pubkey) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(*open_orders, false),
            AccountMeta::new(self.market, false),
            AccountMeta::new(self.request_queue, false),
            AccountMeta::new(self.event_queue, false),
            AccountMeta::new(self.bids, false),
            AccountMeta::new(self.asks, false),
            AccountMeta::new(self.base_vault, false),
            AccountMeta::new(self.quote_vault, false),
            AccountMeta::new_readonly(self.vault_signer, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
            AccountMeta::new_readonly(self.program_id, false),
        ]
    }
}

pub fn decode_market(address: &Pubkey, program_id: &Pubkey, data: &[u8]) -> Result<SerumMarket> {
    if data.len() < MARKET_STATE_SPAN {
        return Err(Error::decode(format!(
            "serum 市场 {address} 数据长度不足: {} 字节",
            data.len()
        )));
    }

    let flags = layout::read_u64(data, OFFSET_ACCOUNT_FLAGS)?;
    if flags & FLAG_INITIALIZED == 0 || flags & FLAG_MARKET == 0 {
        return Err(Error::decode(format!(
            "serum 市场 {address} 账户标志异常: {flags:#x}"
        )));
    }

    let own_address = layout::read_pubkey(data, OFFSET_OWN_ADDRESS)?;
    if own_address != *address {
        return Err(Error::decode(format!(
            "serum 市场 {address} 自引用地址不一致: {own_address}"
        )));
    }

    let vault_signer_nonce = layout::read_u64(data, OFFSET_VAULT_SIGNER_NONCE)?;
    let vault_signer = Pubkey::create_program_address(
        &[address.as_ref(), &vault_signer_nonce.to_le_bytes()],
        program_id,
    )
    .map_err(|_| {
        Error::decode(format!(
            "serum 市场 {address} 的 vault signer 派生失败: nonce {vault_signer_nonce}"
        ))
    })?;

    Ok(SerumMarket {
        program_id: *program_id,
        market: *address,
        base_mint: layout::read_pubkey(data, OFFSET_BASE_MINT)?,
        quote_mint: layout::read_pubkey(data, OFFSET_QUOTE_MINT)?,
        request_queue: layout::read_pubkey(data, OFFSET_REQUEST_QUEUE)?,
        event_queue: layout::read_pubkey(data, OFFSET_EVENT_QUEUE)?,
        bids: layout::read_pubkey(data, OFFSET_BIDS)?,
        asks: layout::read_pubkey(data, OFFSET_ASKS)?,
        base_vault: layout::read_pubkey(data, OFFSET_BASE_VAULT)?,
        quote_vault: layout::read_pubkey(data, OFFSET_QUOTE_VAULT)?,
        vault_signer,
        vault_signer_nonce,
    })
}

/// 某交易者在某市场上的 open orders 账户快照。
#[derive(Debug, Clone)]
pub struct OpenOrdersAccount {
    pub address: Pubkey,
    pub market: Pubkey,
    pub owner: Pubkey,
    pub base_token_free: u64,
    pub base_token_total: u64,
    pub quote_token_free: u64,
    pub quote_token_total: u64,
    pub free_slot_bits: u128,
    pub is_bid_bits: u128,
}

pub fn decode_open_orders(
    address: &Pubkey,
    account_owner: &Pubkey,
    program_id: &Pubkey,
    data: &[u8],
) -> Result<OpenOrdersAccount> {
    if account_owner != program_id {
        return Err(Error::decode(format!(
            "open orders 账户 {address} 不属于 dex 程序"
        )));
    }
    if data.len() < OPEN_ORDERS_SPAN {
        return Err(Error::decode(format!(
            "open orders 账户 {address} 数据长度不足: {} 字节",
            data.len()
        )));
    }
    let flags = layout::read_u64(data, OFFSET_ACCOUNT_FLAGS)?;
    if flags & FLAG_INITIALIZED == 0 || flags & FLAG_OPEN_ORDERS == 0 {
        return Err(Error::decode(format!(
            "open orders 账户 {address} 账户标志异常: {flags:#x}"
        )));
    }
    Ok(OpenOrdersAccount {
        address: *address,
        market: layout::read_pubkey(data, OPEN_ORDERS_OFFSET_MARKET)?,
        owner: layout::read_pubkey(data, OPEN_ORDERS_OFFSET_OWNER)?,
        base_token_free: layout::read_u64(data, OPEN_ORDERS_OFFSET_BASE_FREE)?,
        base_token_total: layout::read_u64(data, OPEN_ORDERS_OFFSET_BASE_TOTAL)?,
        quote_token_free: layout::read_u64(data, OPEN_ORDERS_OFFSET_QUOTE_FREE)?,
        quote_token_total: layout::read_u64(data, OPEN_ORDERS_OFFSET_QUOTE_TOTAL)?,
        free_slot_bits: layout::read_u128(data, OPEN_ORDERS_OFFSET_FREE_SLOT_BITS)?,
        is_bid_bits: layout::read_u128(data, OPEN_ORDERS_OFFSET_IS_BID_BITS)?,
    })
}

/// 按市场与所有者做字节过滤，无需预先知道账户地址。
pub fn open_orders_filters(market: &Pubkey, owner: &Pubkey) -> Vec<AccountFilter> {
    vec![
        AccountFilter::Memcmp {
            offset: OPEN_ORDERS_OFFSET_MARKET,
            bytes: market.to_bytes().to_vec(),
        },
        AccountFilter::Memcmp {
            offset: OPEN_ORDERS_OFFSET_OWNER,
            bytes: owner.to_bytes().to_vec(),
        },
        AccountFilter::DataSize(OPEN_ORDERS_SPAN as u64),
    ]
}

pub async fn find_open_orders_for_market_and_owner<C: ChainReader + ?Sized>(
    chain: &C,
    program_id: &Pubkey,
    market: &Pubkey,
    owner: &Pubkey,
) -> Result<Vec<OpenOrdersAccount>> {
    let accounts = chain
        .get_program_accounts(program_id, open_orders_filters(market, owner))
        .await?;
    accounts
        .into_iter()
        .map(|(address, account)| {
            decode_open_orders(&address, &account.owner, program_id, &account.data)
        })
        .collect()
}

/// dex 程序的 InitOpenOrders 指令（版本前缀 + u32 opcode 15）。
pub fn init_open_orders_instruction(
    open_orders: &Pubkey,
    owner: &Pubkey,
    market: &Pubkey,
    program_id: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*open_orders, false),
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new_readonly(*market, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data: versioned_opcode(15),
    }
}

/// dex 程序的 CloseOpenOrders 指令（u32 opcode 14），租金退回 destination。
pub fn close_open_orders_instruction(
    open_orders: &Pubkey,
    owner: &Pubkey,
    destination: &Pubkey,
    market: &Pubkey,
    program_id: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*open_orders, false),
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*market, false),
        ],
        data: versioned_opcode(14),
    }
}

fn versioned_opcode(opcode: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(5);
    data.push(0);
    data.extend_from_slice(&opcode.to_le_bytes());
    data
}
