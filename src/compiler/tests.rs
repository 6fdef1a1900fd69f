use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use crate::api::types::{RawDistribution, RawRoute, RawTokenMint, TokenInfo, TokenRegistry};
use crate::chain::{AccountFilter, ChainReader};
use crate::consts::{AGGREGATOR_PROGRAM_ID, SYSTEM_PROGRAM_ID, WSOL_MINT};
use crate::error::{Error, Result};
use crate::exchanges::ExchangerKind;
use crate::exchanges::serum::tests::{market_fixture, open_orders_bytes};
use crate::exchanges::token_swap::tests::pool_fixture;
use crate::token::TokenAccountHandle;

use super::{ComposeParams, InstructionGroups, SwapCompiler, default_slippage, minimum_amount_out};

#[derive(Default)]
struct MockChain {
    accounts: HashMap<Pubkey, Account>,
    program_accounts: Vec<(Pubkey, Pubkey, Account)>,
    get_account_calls: AtomicUsize,
    get_program_accounts_calls: AtomicUsize,
}

impl MockChain {
    fn add_account(&mut self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts.insert(
            address,
            Account {
                lamports: 1,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    fn add_program_account(&mut self, program: Pubkey, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.program_accounts.push((
            program,
            address,
            Account {
                lamports: 1,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        ));
    }

    fn chain_calls(&self) -> usize {
        self.get_account_calls.load(Ordering::SeqCst)
            + self.get_program_accounts_calls.load(Ordering::SeqCst)
    }
}

fn matches_filters(account: &Account, filters: &[AccountFilter]) -> bool {
    filters.iter().all(|filter| match filter {
        AccountFilter::DataSize(size) => account.data.len() as u64 == *size,
        AccountFilter::Memcmp { offset, bytes } => account
            .data
            .get(*offset..offset + bytes.len())
            .map(|slice| slice == bytes.as_slice())
            .unwrap_or(false),
    })
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        self.get_account_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<(Pubkey, Account)>> {
        self.get_program_accounts_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .program_accounts
            .iter()
            .filter(|(program, _, account)| {
                program == program_id && matches_filters(account, &filters)
            })
            .map(|(_, address, account)| (*address, account.clone()))
            .collect())
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        Ok(data_len as u64 * 10)
    }
}

fn mint_of(pubkey: Pubkey, decimals: u8) -> RawTokenMint {
    RawTokenMint { decimals, pubkey }
}

fn leg(
    kind: ExchangerKind,
    pool: Pubkey,
    program: Pubkey,
    source_mint: RawTokenMint,
    destination_mint: RawTokenMint,
    amount_in: u64,
    amount_out: u64,
) -> RawRoute {
    RawRoute {
        source_token_mint: source_mint,
        destination_token_mint: destination_mint,
        amount_in,
        amount_out,
        exchanger_flag: kind,
        pubkey: pool,
        program_id: program,
    }
}

fn distribution(
    routes: Vec<Vec<RawRoute>>,
    source_mint: RawTokenMint,
    destination_mint: RawTokenMint,
    amount_in: u64,
    amount_out: u64,
) -> RawDistribution {
    RawDistribution {
        routes,
        split_tx: false,
        source_token_mint: source_mint,
        destination_token_mint: destination_mint,
        amount_in,
        amount_out,
        exchanger_flag: None,
    }
}

fn registry_with_fee(destination_mint: Pubkey) -> (TokenRegistry, Pubkey) {
    let fee = Pubkey::new_unique();
    let registry = TokenRegistry::from_tokens(vec![TokenInfo {
        address: destination_mint,
        decimals: 6,
        symbol: None,
        name: None,
        fee_account: Some(fee),
    }]);
    (registry, fee)
}

fn assert_no_signers(groups: &InstructionGroups) {
    assert!(groups.setup_signers.is_empty());
    assert!(groups.swap_signers.is_empty());
    assert!(groups.cleanup_signers.is_empty());
}

#[tokio::test]
async fn direct_single_leg_token_swap() {
    let pool = pool_fixture();
    let source_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();

    let mut chain = MockChain::default();
    chain.add_account(pool.address, pool.program_id, pool.data.clone());

    let route = distribution(
        vec![vec![leg(
            ExchangerKind::SplTokenSwap,
            pool.address,
            pool.program_id,
            mint_of(source_mint, 6),
            mint_of(destination_mint, 6),
            100_000_000,
            101_000_000,
        )]],
        mint_of(source_mint, 6),
        mint_of(destination_mint, 6),
        100_000_000,
        101_000_000,
    );

    let (registry, fee) = registry_with_fee(destination_mint);
    let wallet = Pubkey::new_unique();
    let source_account = Pubkey::new_unique();
    let destination_account = Pubkey::new_unique();
    let compiler = SwapCompiler::new(Arc::new(chain), registry);

    let groups = compiler
        .compose(ComposeParams {
            distribution: &route,
            wallet,
            source_token_account: TokenAccountHandle::new(source_account, source_mint),
            destination_token_account: TokenAccountHandle::new(
                destination_account,
                destination_mint,
            ),
            slippage: default_slippage(),
        })
        .await
        .unwrap();

    assert_eq!(groups.setup_instructions.len(), 1);
    assert!(groups.swap_instructions.is_empty());
    assert!(groups.cleanup_instructions.is_empty());
    assert_no_signers(&groups);

    let ix = &groups.setup_instructions[0];
    assert_eq!(ix.program_id, AGGREGATOR_PROGRAM_ID);
    assert_eq!(ix.data[0], 3);
    assert_eq!(&ix.data[1..9], &100_000_000u64.to_le_bytes());
    assert_eq!(&ix.data[9..17], &101_000_000u64.to_le_bytes());
    assert_eq!(&ix.data[17..25], &100_495_000u64.to_le_bytes());
    assert_eq!(ix.accounts[0].pubkey, source_account);
    assert_eq!(ix.accounts[1].pubkey, destination_account);
    assert_eq!(ix.accounts[2].pubkey, wallet);
    assert_eq!(ix.accounts[4].pubkey, fee);
}

#[tokio::test]
async fn direct_parallel_legs_preserve_order() {
    let pool_one = pool_fixture();
    let pool_two = pool_fixture();
    let source_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();

    let mut chain = MockChain::default();
    chain.add_account(pool_one.address, pool_one.program_id, pool_one.data.clone());
    chain.add_account(pool_two.address, pool_two.program_id, pool_two.data.clone());

    let route = distribution(
        vec![vec![
            leg(
                ExchangerKind::SplTokenSwap,
                pool_one.address,
                pool_one.program_id,
                mint_of(source_mint, 6),
                mint_of(destination_mint, 6),
                70,
                69,
            ),
            leg(
                ExchangerKind::OrcaSwap,
                pool_two.address,
                pool_two.program_id,
                mint_of(source_mint, 6),
                mint_of(destination_mint, 6),
                30,
                29,
            ),
        ]],
        mint_of(source_mint, 6),
        mint_of(destination_mint, 6),
        100,
        98,
    );

    let (registry, _) = registry_with_fee(destination_mint);
    let compiler = SwapCompiler::new(Arc::new(chain), registry);
    let groups = compiler
        .compose(ComposeParams {
            distribution: &route,
            wallet: Pubkey::new_unique(),
            source_token_account: TokenAccountHandle::new(Pubkey::new_unique(), source_mint),
            destination_token_account: TokenAccountHandle::new(
                Pubkey::new_unique(),
                destination_mint,
            ),
            slippage: default_slippage(),
        })
        .await
        .unwrap();

    assert_eq!(groups.setup_instructions.len(), 2);
    // 指令顺序跟随腿在路由中的顺序，而不是加载完成的顺序。
    assert_eq!(groups.setup_instructions[0].accounts[5].pubkey, pool_one.address);
    assert_eq!(groups.setup_instructions[1].accounts[5].pubkey, pool_two.address);
}

#[tokio::test]
async fn indirect_token_swap_then_serum() {
    let pool = pool_fixture();
    let market = market_fixture();
    let source_mint = Pubkey::new_unique();
    let middle_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();

    let mut chain = MockChain::default();
    chain.add_account(pool.address, pool.program_id, pool.data.clone());
    chain.add_account(market.address, market.program_id, market.data.clone());

    let route = distribution(
        vec![
            vec![leg(
                ExchangerKind::SplTokenSwap,
                pool.address,
                pool.program_id,
                mint_of(source_mint, 6),
                mint_of(middle_mint, 6),
                1_000_000,
                990_000,
            )],
            vec![leg(
                ExchangerKind::SerumDex,
                market.address,
                market.program_id,
                mint_of(middle_mint, 6),
                mint_of(destination_mint, 9),
                990_000,
                980_000,
            )],
        ],
        mint_of(source_mint, 6),
        mint_of(destination_mint, 9),
        1_000_000,
        980_000,
    );

    let (registry, _) = registry_with_fee(destination_mint);
    let wallet = Pubkey::new_unique();
    let compiler = SwapCompiler::new(Arc::new(chain), registry);
    let groups = compiler
        .compose(ComposeParams {
            distribution: &route,
            wallet,
            source_token_account: TokenAccountHandle::new(Pubkey::new_unique(), source_mint),
            destination_token_account: TokenAccountHandle::new(
                Pubkey::new_unique(),
                destination_mint,
            ),
            slippage: default_slippage(),
        })
        .await
        .unwrap();

    // setup: 中间账户 ATA + swap info(创建 + 初始化) + open orders 创建 + 绑定
    assert_eq!(groups.setup_instructions.len(), 5);
    assert_eq!(
        groups.setup_instructions[0].program_id,
        spl_associated_token_account::ID
    );
    assert_eq!(groups.setup_instructions[1].program_id, SYSTEM_PROGRAM_ID);
    assert_eq!(groups.setup_instructions[2].program_id, AGGREGATOR_PROGRAM_ID);
    assert_eq!(groups.setup_instructions[2].data, vec![10]);
    assert_eq!(groups.setup_instructions[3].program_id, SYSTEM_PROGRAM_ID);
    assert_eq!(groups.setup_instructions[4].data, vec![11]);

    // swap info 创建、初始化与绑定指向同一账户。
    let swap_info = groups.setup_instructions[1].accounts[1].pubkey;
    assert_eq!(groups.setup_instructions[2].accounts[0].pubkey, swap_info);
    assert_eq!(groups.setup_instructions[4].accounts[0].pubkey, swap_info);

    // swap 组: 先 swap-in(12) 后 swap-out(15)，顺序固定。
    assert_eq!(groups.swap_instructions.len(), 2);
    assert_eq!(groups.swap_instructions[0].data[0], 12);
    assert_eq!(groups.swap_instructions[1].data[0], 15);
    assert_eq!(groups.swap_instructions[0].accounts[3].pubkey, swap_info);
    assert_eq!(groups.swap_instructions[1].accounts[3].pubkey, swap_info);

    // swap-in 的目标与 swap-out 的来源都是中间账户。
    let middle_account = groups.setup_instructions[0].accounts[1].pubkey;
    assert_eq!(groups.swap_instructions[0].accounts[1].pubkey, middle_account);
    assert_eq!(groups.swap_instructions[1].accounts[0].pubkey, middle_account);

    // 新建 swap info + 新建 open orders 两个临时签名者。
    assert_eq!(groups.setup_signers.len(), 2);
    assert!(groups.cleanup_instructions.is_empty());
}

#[tokio::test]
async fn validation_failures_precede_chain_io() {
    let pool = pool_fixture();
    let source_mint = Pubkey::new_unique();
    let wrong_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();

    let chain = Arc::new(MockChain::default());
    let route = distribution(
        vec![vec![leg(
            ExchangerKind::SplTokenSwap,
            pool.address,
            pool.program_id,
            mint_of(source_mint, 6),
            mint_of(destination_mint, 6),
            100,
            99,
        )]],
        mint_of(source_mint, 6),
        mint_of(destination_mint, 6),
        100,
        99,
    );

    let (registry, _) = registry_with_fee(destination_mint);
    let compiler = SwapCompiler::new(chain.clone(), registry);
    let err = compiler
        .compose(ComposeParams {
            distribution: &route,
            wallet: Pubkey::new_unique(),
            source_token_account: TokenAccountHandle::new(Pubkey::new_unique(), wrong_mint),
            destination_token_account: TokenAccountHandle::new(
                Pubkey::new_unique(),
                destination_mint,
            ),
            slippage: default_slippage(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(chain.chain_calls(), 0);
}

#[tokio::test]
async fn missing_fee_account_fails_validation() {
    let pool = pool_fixture();
    let source_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();

    let chain = Arc::new(MockChain::default());
    let route = distribution(
        vec![vec![leg(
            ExchangerKind::SplTokenSwap,
            pool.address,
            pool.program_id,
            mint_of(source_mint, 6),
            mint_of(destination_mint, 6),
            100,
            99,
        )]],
        mint_of(source_mint, 6),
        mint_of(destination_mint, 6),
        100,
        99,
    );

    let compiler = SwapCompiler::new(chain.clone(), TokenRegistry::default());
    let err = compiler
        .compose(ComposeParams {
            distribution: &route,
            wallet: Pubkey::new_unique(),
            source_token_account: TokenAccountHandle::new(Pubkey::new_unique(), source_mint),
            destination_token_account: TokenAccountHandle::new(
                Pubkey::new_unique(),
                destination_mint,
            ),
            slippage: default_slippage(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(chain.chain_calls(), 0);
}

#[tokio::test]
async fn unsupported_hop_counts_are_rejected() {
    let source_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();
    let (registry, _) = registry_with_fee(destination_mint);
    let chain = Arc::new(MockChain::default());
    let compiler = SwapCompiler::new(chain.clone(), registry);

    let single_leg = |pool: Pubkey| {
        vec![leg(
            ExchangerKind::SplTokenSwap,
            pool,
            Pubkey::new_unique(),
            mint_of(source_mint, 6),
            mint_of(destination_mint, 6),
            100,
            99,
        )]
    };

    for hops in [0usize, 3] {
        let routes = (0..hops).map(|_| single_leg(Pubkey::new_unique())).collect();
        let route = distribution(
            routes,
            mint_of(source_mint, 6),
            mint_of(destination_mint, 6),
            100,
            99,
        );
        let err = compiler
            .compose(ComposeParams {
                distribution: &route,
                wallet: Pubkey::new_unique(),
                source_token_account: TokenAccountHandle::new(Pubkey::new_unique(), source_mint),
                destination_token_account: TokenAccountHandle::new(
                    Pubkey::new_unique(),
                    destination_mint,
                ),
                slippage: default_slippage(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedRoute { hops: h } if h == hops));
    }
    assert_eq!(chain.chain_calls(), 0);
}

#[tokio::test]
async fn open_orders_cache_avoids_repeat_lookups() {
    let market = market_fixture();
    let source_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();
    let wallet = Pubkey::new_unique();

    let mut chain = MockChain::default();
    chain.add_account(market.address, market.program_id, market.data.clone());
    // 既有 open orders 账户，按字节过滤可命中。
    let open_orders_address = Pubkey::new_unique();
    chain.add_program_account(
        market.program_id,
        open_orders_address,
        market.program_id,
        open_orders_bytes(&market.address, &wallet),
    );
    let chain = Arc::new(chain);

    let route = distribution(
        vec![vec![leg(
            ExchangerKind::SerumDex,
            market.address,
            market.program_id,
            mint_of(source_mint, 6),
            mint_of(destination_mint, 6),
            100,
            99,
        )]],
        mint_of(source_mint, 6),
        mint_of(destination_mint, 6),
        100,
        99,
    );

    let (registry, _) = registry_with_fee(destination_mint);
    let compiler = SwapCompiler::new(chain.clone(), registry);
    let params = || ComposeParams {
        distribution: &route,
        wallet,
        source_token_account: TokenAccountHandle::new(Pubkey::new_unique(), source_mint),
        destination_token_account: TokenAccountHandle::new(Pubkey::new_unique(), destination_mint),
        slippage: default_slippage(),
    };

    let groups = compiler.compose(params()).await.unwrap();
    assert_eq!(groups.setup_instructions.len(), 1);
    assert_eq!(
        groups.setup_instructions[0].accounts[5].pubkey,
        open_orders_address
    );
    assert_eq!(chain.get_program_accounts_calls.load(Ordering::SeqCst), 1);

    // 保鲜期内二次编译不再回源。
    compiler.compose(params()).await.unwrap();
    assert_eq!(chain.get_program_accounts_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn open_orders_creation_invalidates_cache() {
    let market = market_fixture();
    let source_mint = Pubkey::new_unique();
    let destination_mint = Pubkey::new_unique();
    let wallet = Pubkey::new_unique();

    let mut chain = MockChain::default();
    chain.add_account(market.address, market.program_id, market.data.clone());
    let chain = Arc::new(chain);

    let route = distribution(
        vec![vec![leg(
            ExchangerKind::SerumDex,
            market.address,
            market.program_id,
            mint_of(source_mint, 6),
            mint_of(destination_mint, 6),
            100,
            99,
        )]],
        mint_of(source_mint, 6),
        mint_of(destination_mint, 6),
        100,
        99,
    );

    let (registry, _) = registry_with_fee(destination_mint);
    let compiler = SwapCompiler::new(chain.clone(), registry);
    let params = || ComposeParams {
        distribution: &route,
        wallet,
        source_token_account: TokenAccountHandle::new(Pubkey::new_unique(), source_mint),
        destination_token_account: TokenAccountHandle::new(Pubkey::new_unique(), destination_mint),
        slippage: default_slippage(),
    };

    let groups = compiler.compose(params()).await.unwrap();
    // 找不到账户: 先建号再下单，账户归 dex 程序所有。
    assert_eq!(groups.setup_instructions.len(), 2);
    assert_eq!(groups.setup_instructions[0].program_id, SYSTEM_PROGRAM_ID);
    assert_eq!(groups.setup_signers.len(), 1);
    assert_eq!(chain.get_program_accounts_calls.load(Ordering::SeqCst), 1);

    // 创建动作已把缓存条目打为失效，下一次编译必须重新核实。
    compiler.compose(params()).await.unwrap();
    assert_eq!(chain.get_program_accounts_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn wrapped_native_source_synthesizes_temp_account() {
    let pool = pool_fixture();
    let destination_mint = Pubkey::new_unique();

    let mut chain = MockChain::default();
    chain.add_account(pool.address, pool.program_id, pool.data.clone());

    let route = distribution(
        vec![vec![leg(
            ExchangerKind::SplTokenSwap,
            pool.address,
            pool.program_id,
            mint_of(WSOL_MINT, 9),
            mint_of(destination_mint, 6),
            5_000_000_000,
            120_000_000,
        )]],
        mint_of(WSOL_MINT, 9),
        mint_of(destination_mint, 6),
        5_000_000_000,
        120_000_000,
    );

    let (registry, _) = registry_with_fee(destination_mint);
    let wallet = Pubkey::new_unique();
    let compiler = SwapCompiler::new(Arc::new(chain), registry);
    let groups = compiler
        .compose(ComposeParams {
            distribution: &route,
            wallet,
            source_token_account: TokenAccountHandle::wrapped_native(),
            destination_token_account: TokenAccountHandle::new(
                Pubkey::new_unique(),
                destination_mint,
            ),
            slippage: default_slippage(),
        })
        .await
        .unwrap();

    // setup: 建号 + 注资 + 初始化 + swap
    assert_eq!(groups.setup_instructions.len(), 4);
    assert_eq!(groups.setup_instructions[0].program_id, SYSTEM_PROGRAM_ID);
    assert_eq!(groups.setup_instructions[1].program_id, SYSTEM_PROGRAM_ID);
    assert_eq!(groups.setup_instructions[2].program_id, spl_token::ID);
    assert_eq!(groups.setup_instructions[2].data, vec![1]);
    assert_eq!(groups.setup_instructions[3].data[0], 3);
    assert_eq!(groups.setup_signers.len(), 1);

    // cleanup: 关闭临时账户，租金回到钱包。
    assert_eq!(groups.cleanup_instructions.len(), 1);
    assert_eq!(groups.cleanup_instructions[0].data, vec![9]);
    let temp_account = groups.setup_instructions[0].accounts[1].pubkey;
    assert_eq!(groups.cleanup_instructions[0].accounts[0].pubkey, temp_account);
    assert_eq!(groups.setup_instructions[3].accounts[0].pubkey, temp_account);
}

#[test]
fn minimum_amount_out_rounds_up() {
    assert_eq!(
        minimum_amount_out(101_000_000, default_slippage()).unwrap(),
        100_495_000
    );
    // 0.9999 × 1000 = 999.9 → 向上取整保住滑点下限。
    assert_eq!(
        minimum_amount_out(1_000, Decimal::new(1, 4)).unwrap(),
        1_000
    );
    assert_eq!(minimum_amount_out(0, default_slippage()).unwrap(), 0);
    assert_eq!(
        minimum_amount_out(u64::MAX, Decimal::ZERO).unwrap(),
        u64::MAX
    );
}
