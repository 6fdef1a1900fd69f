//! 路由编译器: 把路由服务给出的 Distribution 翻译成三组指令。
//!
//! setup 必须先于 swap 上链确认，cleanup 尽力而为可跳过；任何一步
//! 失败调用方都要整体丢弃结果，不存在部分成功。

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_system_interface::instruction as system_instruction;
use tracing::debug;

use crate::api::types::{RawDistribution, RawRoute, TokenRegistry};
use crate::cache::{OpenOrdersCache, SwapInfoCache};
use crate::chain::ChainReader;
use crate::consts::{AGGREGATOR_PROGRAM_ID, WSOL_MINT};
use crate::error::{Error, Result};
use crate::exchanges::{ExchangeModel, SerumMarket};
use crate::exchanges::serum::{OPEN_ORDERS_SPAN, find_open_orders_for_market_and_owner};
use crate::instructions::{
    SwapAmounts, SwapLegKeys, direct_swap_instruction, init_swap_info_instruction,
    set_swap_info_instruction, swap_in_instruction, swap_out_instruction,
};
use crate::layout::LayoutError;
use crate::swap_info::{SWAP_INFO_SPAN, find_swap_info};
use crate::token::{TokenAccountHandle, create_wrapped_native_account, find_or_create_token_account};

#[cfg(test)]
mod tests;

/// 默认滑点容忍度 0.5%。
pub fn default_slippage() -> Decimal {
    Decimal::new(5, 3)
}

/// 编译产物: 三组有序指令与对应的临时签名者。
/// 组内顺序有链上语义，不可重排。
#[derive(Default, Debug)]
pub struct InstructionGroups {
    pub setup_instructions: Vec<Instruction>,
    pub swap_instructions: Vec<Instruction>,
    pub cleanup_instructions: Vec<Instruction>,
    pub setup_signers: Vec<Keypair>,
    pub swap_signers: Vec<Keypair>,
    pub cleanup_signers: Vec<Keypair>,
}

/// 一次编译的输入。
#[derive(Debug, Clone)]
pub struct ComposeParams<'a> {
    pub distribution: &'a RawDistribution,
    pub wallet: Pubkey,
    pub source_token_account: TokenAccountHandle,
    pub destination_token_account: TokenAccountHandle,
    pub slippage: Decimal,
}

pub struct SwapCompiler<C: ChainReader + ?Sized> {
    chain: Arc<C>,
    program_id: Pubkey,
    registry: TokenRegistry,
    open_orders_cache: OpenOrdersCache,
    swap_info_cache: SwapInfoCache,
}

struct PreparedLeg {
    model: ExchangeModel,
    /// serum 腿预取到的既有 open orders 地址（缓存命中或回源结果）。
    existing_open_orders: Option<Vec<Pubkey>>,
}

impl<C: ChainReader + ?Sized> SwapCompiler<C> {
    pub fn new(chain: Arc<C>, registry: TokenRegistry) -> Self {
        Self {
            chain,
            program_id: AGGREGATOR_PROGRAM_ID,
            registry,
            open_orders_cache: OpenOrdersCache::default(),
            swap_info_cache: SwapInfoCache::default(),
        }
    }

    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn with_open_orders_ttl(mut self, ttl: Duration) -> Self {
        self.open_orders_cache = OpenOrdersCache::new(ttl);
        self
    }

    /// 编译入口。校验全部通过之前不发生任何链上读取。
    pub async fn compose(&self, params: ComposeParams<'_>) -> Result<InstructionGroups> {
        let fee_token_account = self.validate(&params)?;

        let ComposeParams {
            distribution,
            wallet,
            source_token_account,
            destination_token_account,
            slippage,
        } = params;

        let mut groups = InstructionGroups::default();

        let source_account = self
            .resolve_source_account(&source_token_account, &wallet, distribution.amount_in, &mut groups)
            .await?;
        let destination_account = match destination_token_account.pubkey {
            Some(pubkey) => pubkey,
            None => {
                find_or_create_token_account(
                    self.chain.as_ref(),
                    &wallet,
                    &wallet,
                    &destination_token_account.mint,
                    0,
                    &mut groups.setup_instructions,
                    &mut groups.setup_signers,
                    &mut groups.cleanup_instructions,
                )
                .await?
            }
        };

        match distribution.routes.len() {
            1 => {
                self.compose_direct(
                    distribution,
                    &wallet,
                    &source_account,
                    &destination_account,
                    &fee_token_account,
                    slippage,
                    &mut groups,
                )
                .await?;
            }
            2 => {
                self.compose_indirect(
                    distribution,
                    &wallet,
                    &source_account,
                    &destination_account,
                    &fee_token_account,
                    slippage,
                    &mut groups,
                )
                .await?;
            }
            hops => return Err(Error::UnsupportedRoute { hops }),
        }

        Ok(groups)
    }

    /// 直达路径: 单跳的各并行腿全部编进 setup 组，一笔交易即可完成。
    async fn compose_direct(
        &self,
        distribution: &RawDistribution,
        wallet: &Pubkey,
        source_account: &Pubkey,
        destination_account: &Pubkey,
        fee_token_account: &Pubkey,
        slippage: Decimal,
        groups: &mut InstructionGroups,
    ) -> Result<()> {
        let legs = &distribution.routes[0];
        let prepared = try_join_all(legs.iter().map(|leg| self.prepare_leg(leg, wallet))).await?;

        for (leg, prepared) in legs.iter().zip(prepared) {
            let open_orders = self
                .ensure_open_orders(&prepared, wallet, groups)
                .await?;
            let amounts = SwapAmounts {
                amount_in: leg.amount_in,
                expect_amount_out: leg.amount_out,
                minimum_amount_out: minimum_amount_out(leg.amount_out, slippage)?,
            };
            let keys = SwapLegKeys {
                source_token_account: source_account,
                destination_token_account: destination_account,
                wallet,
                source_mint: &leg.source_token_mint.pubkey,
                open_orders: open_orders.as_ref(),
            };
            groups.setup_instructions.push(direct_swap_instruction(
                &self.program_id,
                &prepared.model,
                &keys,
                fee_token_account,
                &amounts,
            )?);
        }

        debug!(
            target: "compiler",
            legs = legs.len(),
            "直达路由编译完成"
        );
        Ok(())
    }

    /// 间接路径: 中间账户与 swap info 走 setup，两腿 swap 单独成组。
    async fn compose_indirect(
        &self,
        distribution: &RawDistribution,
        wallet: &Pubkey,
        source_account: &Pubkey,
        destination_account: &Pubkey,
        fee_token_account: &Pubkey,
        slippage: Decimal,
        groups: &mut InstructionGroups,
    ) -> Result<()> {
        // 每跳取第一条腿。
        let first = &distribution.routes[0][0];
        let second = &distribution.routes[1][0];
        let middle_mint = first.destination_token_mint.pubkey;

        let middle_account = find_or_create_token_account(
            self.chain.as_ref(),
            wallet,
            wallet,
            &middle_mint,
            0,
            &mut groups.setup_instructions,
            &mut groups.setup_signers,
            &mut groups.cleanup_instructions,
        )
        .await?;

        let swap_info = self.find_or_create_swap_info(wallet, groups).await?;

        let (leg_in, leg_out) = futures::try_join!(
            self.prepare_leg(first, wallet),
            self.prepare_leg(second, wallet)
        )?;
        let open_orders_in = self.ensure_open_orders(&leg_in, wallet, groups).await?;
        let open_orders_out = self.ensure_open_orders(&leg_out, wallet, groups).await?;

        groups.setup_instructions.push(set_swap_info_instruction(
            &self.program_id,
            &swap_info,
            &middle_account,
        ));

        let keys_in = SwapLegKeys {
            source_token_account: source_account,
            destination_token_account: &middle_account,
            wallet,
            source_mint: &first.source_token_mint.pubkey,
            open_orders: open_orders_in.as_ref(),
        };
        groups.swap_instructions.push(swap_in_instruction(
            &self.program_id,
            &leg_in.model,
            &keys_in,
            &swap_info,
            first.amount_in,
        )?);

        let keys_out = SwapLegKeys {
            source_token_account: &middle_account,
            destination_token_account: destination_account,
            wallet,
            source_mint: &second.source_token_mint.pubkey,
            open_orders: open_orders_out.as_ref(),
        };
        groups.swap_instructions.push(swap_out_instruction(
            &self.program_id,
            &leg_out.model,
            &keys_out,
            &swap_info,
            fee_token_account,
            second.amount_out,
            minimum_amount_out(second.amount_out, slippage)?,
        )?);

        debug!(
            target: "compiler",
            middle_mint = %middle_mint,
            swap_info = %swap_info,
            "间接路由编译完成"
        );
        Ok(())
    }

    /// 前置校验，全部失败路径都先于链上 IO。返回协议收费账户。
    fn validate(&self, params: &ComposeParams<'_>) -> Result<Pubkey> {
        let distribution = params.distribution;
        let hops = distribution.routes.len();
        if hops == 0 || hops > 2 {
            return Err(Error::UnsupportedRoute { hops });
        }
        if distribution.routes.iter().any(Vec::is_empty) {
            return Err(Error::validation("路由中存在没有腿的跳"));
        }
        if params.wallet == Pubkey::default() {
            return Err(Error::validation("缺少钱包地址"));
        }
        if params.slippage < Decimal::ZERO || params.slippage >= Decimal::ONE {
            return Err(Error::validation(format!(
                "滑点超出范围: {}",
                params.slippage
            )));
        }

        let source = &params.source_token_account;
        if source.mint != WSOL_MINT && source.pubkey.is_none() {
            return Err(Error::validation("缺少源 token 账户"));
        }
        if source.mint != distribution.source_token_mint.pubkey {
            return Err(Error::validation(format!(
                "源账户 mint {} 与路由源资产 {} 不一致",
                source.mint, distribution.source_token_mint.pubkey
            )));
        }
        let destination = &params.destination_token_account;
        if destination.mint != distribution.destination_token_mint.pubkey {
            return Err(Error::validation(format!(
                "目标账户 mint {} 与路由目标资产 {} 不一致",
                destination.mint, distribution.destination_token_mint.pubkey
            )));
        }

        if hops == 2 {
            let middle_mint = distribution.routes[0][0].destination_token_mint.pubkey;
            let hop_one_consistent = distribution.routes[0]
                .iter()
                .all(|leg| leg.destination_token_mint.pubkey == middle_mint);
            let hop_two_consistent = distribution.routes[1]
                .iter()
                .all(|leg| leg.source_token_mint.pubkey == middle_mint);
            if !hop_one_consistent || !hop_two_consistent {
                return Err(Error::validation("两跳路由的中间资产不一致"));
            }
            if distribution.routes[1][0].amount_out == 0 {
                return Err(Error::validation("第二跳预期输出为零"));
            }
        }

        self.registry
            .fee_token_account(&distribution.destination_token_mint.pubkey)
            .ok_or_else(|| {
                Error::validation(format!(
                    "目标资产 {} 缺少协议收费账户",
                    distribution.destination_token_mint.pubkey
                ))
            })
    }

    async fn resolve_source_account(
        &self,
        source: &TokenAccountHandle,
        wallet: &Pubkey,
        amount_in: u64,
        groups: &mut InstructionGroups,
    ) -> Result<Pubkey> {
        if source.mint == WSOL_MINT {
            let account = create_wrapped_native_account(
                self.chain.as_ref(),
                wallet,
                wallet,
                amount_in,
                &mut groups.setup_instructions,
                &mut groups.setup_signers,
            )
            .await?;
            groups
                .cleanup_instructions
                .push(crate::token::close_token_account_instruction(&account, wallet));
            return Ok(account);
        }
        source
            .pubkey
            .ok_or_else(|| Error::validation("缺少源 token 账户"))
    }

    /// 并发阶段: 只做读取，不产出指令，保证腿的输出顺序由输入顺序决定。
    async fn prepare_leg(&self, leg: &RawRoute, owner: &Pubkey) -> Result<PreparedLeg> {
        let model = ExchangeModel::load(
            self.chain.as_ref(),
            leg.exchanger_flag,
            &leg.pubkey,
            &leg.program_id,
        )
        .await?;

        let existing_open_orders = match model.serum_market() {
            Some(market) => Some(self.lookup_open_orders(market, owner).await?),
            None => None,
        };

        Ok(PreparedLeg {
            model,
            existing_open_orders,
        })
    }

    async fn lookup_open_orders(
        &self,
        market: &SerumMarket,
        owner: &Pubkey,
    ) -> Result<Vec<Pubkey>> {
        if let Some(cached) = self
            .open_orders_cache
            .fresh_accounts(owner, &market.market)
        {
            debug!(
                target: "cache::open_orders",
                market = %market.market,
                owner = %owner,
                hits = cached.len(),
                "open orders 缓存命中"
            );
            return Ok(cached);
        }

        let accounts = find_open_orders_for_market_and_owner(
            self.chain.as_ref(),
            &market.program_id,
            &market.market,
            owner,
        )
        .await?;
        let addresses: Vec<Pubkey> = accounts.iter().map(|account| account.address).collect();
        self.open_orders_cache
            .store(owner, &market.market, addresses.clone());
        Ok(addresses)
    }

    /// serum 腿的 open orders 找不到就地创建。创建后立刻失效缓存条目，
    /// 避免后续查询相信尚未落地的账户。
    async fn ensure_open_orders(
        &self,
        prepared: &PreparedLeg,
        owner: &Pubkey,
        groups: &mut InstructionGroups,
    ) -> Result<Option<Pubkey>> {
        let Some(market) = prepared.model.serum_market() else {
            return Ok(None);
        };
        let existing = prepared
            .existing_open_orders
            .as_deref()
            .unwrap_or_default();
        if let Some(address) = existing.first() {
            return Ok(Some(*address));
        }

        let rent = self
            .chain
            .minimum_balance_for_rent_exemption(OPEN_ORDERS_SPAN)
            .await?;
        let new_account = Keypair::new();
        let address = new_account.pubkey();
        groups
            .setup_instructions
            .push(system_instruction::create_account(
                owner,
                &address,
                rent,
                OPEN_ORDERS_SPAN as u64,
                &market.program_id,
            ));
        groups.setup_signers.push(new_account);
        self.open_orders_cache.mark_stale(owner, &market.market);

        debug!(
            target: "compiler",
            market = %market.market,
            open_orders = %address,
            "新建 open orders 账户"
        );
        Ok(Some(address))
    }

    /// 找到或创建 owner 的 swap info 暂存账户。地址一经创建不再变化，
    /// 查询命中后无限期缓存。
    async fn find_or_create_swap_info(
        &self,
        owner: &Pubkey,
        groups: &mut InstructionGroups,
    ) -> Result<Pubkey> {
        if let Some(cached) = self.swap_info_cache.get(owner) {
            return Ok(cached);
        }
        if let Some(existing) = find_swap_info(self.chain.as_ref(), &self.program_id, owner).await?
        {
            self.swap_info_cache.insert(*owner, existing.pubkey);
            return Ok(existing.pubkey);
        }

        let rent = self
            .chain
            .minimum_balance_for_rent_exemption(SWAP_INFO_SPAN)
            .await?;
        let new_account = Keypair::new();
        let address = new_account.pubkey();
        groups
            .setup_instructions
            .push(system_instruction::create_account(
                owner,
                &address,
                rent,
                SWAP_INFO_SPAN as u64,
                &self.program_id,
            ));
        groups
            .setup_instructions
            .push(init_swap_info_instruction(&self.program_id, &address, owner));
        groups.setup_signers.push(new_account);

        debug!(target: "compiler", swap_info = %address, "新建 swap info 账户");
        Ok(address)
    }
}

/// `ceil(expect × (1 − slippage))`，全程定点运算避免浮点误差。
pub fn minimum_amount_out(expect_amount_out: u64, slippage: Decimal) -> Result<u64> {
    let factor = Decimal::ONE - slippage;
    let minimum = (Decimal::from(expect_amount_out) * factor).ceil();
    minimum
        .to_u64()
        .ok_or(Error::Layout(LayoutError::Overflow))
}
