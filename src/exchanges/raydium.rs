//! raydium v4 AMM 池账户模型。
//!
//! 池子引用了一个 serum 市场，加载时做二级拉取；市场拉不到则整个
//! 池子视为不可用。authority 是固定种子 "amm authority" 的 PDA。

use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::chain::ChainReader;
use crate::error::{Error, Result};
use crate::layout;

use super::serum::SerumMarket;

pub const AMM_INFO_SPAN: usize = 752;

const AMM_AUTHORITY_SEED: &[u8] = b"amm authority";

const OFFSET_BASE_VAULT: usize = 336;
const OFFSET_QUOTE_VAULT: usize = 368;
const OFFSET_OPEN_ORDERS: usize = 496;
const OFFSET_MARKET_ID: usize = 528;
const OFFSET_MARKET_PROGRAM_ID: usize = 560;
const OFFSET_TARGET_ORDERS: usize = 592;

#[derive(Debug, Clone)]
pub struct RaydiumAmm {
    pub program_id: Pubkey,
    pub amm: Pubkey,
    pub authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub market: SerumMarket,
}

impl RaydiumAmm {
    pub async fn load<C: ChainReader + ?Sized>(
        chain: &C,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Self> {
        let account = chain
            .get_account(address)
            .await?
            .ok_or_else(|| Error::not_found(format!("raydium 池 {address}")))?;
        let data = &account.data;
        if data.len() < AMM_INFO_SPAN {
            return Err(Error::decode(format!(
                "raydium 池 {address} 数据长度不足: {} 字节",
                data.len()
            )));
        }

        let authority = Pubkey::find_program_address(&[AMM_AUTHORITY_SEED], program_id).0;
        let market_id = layout::read_pubkey(data, OFFSET_MARKET_ID)?;
        let market_program_id = layout::read_pubkey(data, OFFSET_MARKET_PROGRAM_ID)?;

        // 二级拉取: 池子挂单走的 serum 市场。
        let market = SerumMarket::load(chain, &market_id, &market_program_id).await?;

        debug!(
            target: "exchange::raydium",
            amm = %address,
            market = %market_id,
            "已加载 raydium 池"
        );

        Ok(RaydiumAmm {
            program_id: *program_id,
            amm: *address,
            authority,
            open_orders: layout::read_pubkey(data, OFFSET_OPEN_ORDERS)?,
            target_orders: layout::read_pubkey(data, OFFSET_TARGET_ORDERS)?,
            base_vault: layout::read_pubkey(data, OFFSET_BASE_VAULT)?,
            quote_vault: layout::read_pubkey(data, OFFSET_QUOTE_VAULT)?,
            market,
        })
    }

    /// 标准账户后缀（带 target_orders）。
    pub fn swap_keys(&self) -> Vec<AccountMeta> {
        let mut keys = Vec::with_capacity(15);
        keys.push(AccountMeta::new(self.amm, false));
        keys.push(AccountMeta::new_readonly(self.authority, false));
        keys.push(AccountMeta::new(self.open_orders, false));
        keys.push(AccountMeta::new(self.target_orders, false));
        self.push_common_tail(&mut keys);
        keys
    }

    /// 替代账户后缀（不带 target_orders），对应 opcode 20/21。
    pub fn alt_swap_keys(&self) -> Vec<AccountMeta> {
        let mut keys = Vec::with_capacity(14);
        keys.push(AccountMeta::new(self.amm, false));
        keys.push(AccountMeta::new_readonly(self.authority, false));
        keys.push(AccountMeta::new(self.open_orders, false));
        self.push_common_tail(&mut keys);
        keys
    }

    fn push_common_tail(&self, keys: &mut Vec<AccountMeta>) {
        keys.push(AccountMeta::new(self.base_vault, false));
        keys.push(AccountMeta::new(self.quote_vault, false));
        keys.push(AccountMeta::new_readonly(self.market.program_id, false));
        keys.push(AccountMeta::new(self.market.market, false));
        keys.push(AccountMeta::new(self.market.bids, false));
        keys.push(AccountMeta::new(self.market.asks, false));
        keys.push(AccountMeta::new(self.market.event_queue, false));
        keys.push(AccountMeta::new(self.market.base_vault, false));
        keys.push(AccountMeta::new(self.market.quote_vault, false));
        keys.push(AccountMeta::new_readonly(self.market.vault_signer, false));
        keys.push(AccountMeta::new_readonly(self.program_id, false));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exchanges::serum::tests::market_fixture;
    use crate::exchanges::serum::decode_market;

    pub(crate) fn amm_fixture() -> (RaydiumAmm, Vec<u8>) {
        let market_fixture = market_fixture();
        let market = decode_market(
            &market_fixture.address,
            &market_fixture.program_id,
            &market_fixture.data,
        )
        .unwrap();

        let program_id = Pubkey::new_unique();
        let amm = Pubkey::new_unique();
        let mut data = vec![0u8; AMM_INFO_SPAN];
        layout::write_pubkey(&Pubkey::new_unique(), &mut data, OFFSET_BASE_VAULT).unwrap();
        layout::write_pubkey(&Pubkey::new_unique(), &mut data, OFFSET_QUOTE_VAULT).unwrap();
        layout::write_pubkey(&Pubkey::new_unique(), &mut data, OFFSET_OPEN_ORDERS).unwrap();
        layout::write_pubkey(&market.market, &mut data, OFFSET_MARKET_ID).unwrap();
        layout::write_pubkey(&market.program_id, &mut data, OFFSET_MARKET_PROGRAM_ID).unwrap();
        layout::write_pubkey(&Pubkey::new_unique(), &mut data, OFFSET_TARGET_ORDERS).unwrap();

        let model = RaydiumAmm {
            program_id,
            amm,
            authority: Pubkey::find_program_address(&[AMM_AUTHORITY_SEED], &program_id).0,
            open_orders: layout::read_pubkey(&data, OFFSET_OPEN_ORDERS).unwrap(),
            target_orders: layout::read_pubkey(&data, OFFSET_TARGET_ORDERS).unwrap(),
            base_vault: layout::read_pubkey(&data, OFFSET_BASE_VAULT).unwrap(),
            quote_vault: layout::read_pubkey(&data, OFFSET_QUOTE_VAULT).unwrap(),
            market,
        };
        (model, data)
    }

    #[test]
    fn swap_keys_order_is_fixed() {
        let (amm, _) = amm_fixture();
        let keys = amm.swap_keys();
        let expected = [
            (amm.amm, true),
            (amm.authority, false),
            (amm.open_orders, true),
            (amm.target_orders, true),
            (amm.base_vault, true),
            (amm.quote_vault, true),
            (amm.market.program_id, false),
            (amm.market.market, true),
            (amm.market.bids, true),
            (amm.market.asks, true),
            (amm.market.event_queue, true),
            (amm.market.base_vault, true),
            (amm.market.quote_vault, true),
            (amm.market.vault_signer, false),
            (amm.program_id, false),
        ];
        assert_eq!(keys.len(), expected.len());
        for (meta, (pubkey, writable)) in keys.iter().zip(expected) {
            assert_eq!(meta.pubkey, pubkey);
            assert_eq!(meta.is_writable, writable);
            assert!(!meta.is_signer);
        }
    }

    #[test]
    fn alt_swap_keys_skip_target_orders() {
        let (amm, _) = amm_fixture();
        let keys = amm.alt_swap_keys();
        assert_eq!(keys.len(), 14);
        assert_eq!(keys[2].pubkey, amm.open_orders);
        assert_eq!(keys[3].pubkey, amm.base_vault);
        assert!(!keys.iter().any(|meta| meta.pubkey == amm.target_orders));
    }
}
