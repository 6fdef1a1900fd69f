//! 进程内账户地址缓存。
//!
//! 缓存只保存公开地址与时间戳，随时清空也不影响正确性，只会带来
//! 额外的链上查询。两个缓存都由编译器实例持有，按需注入。

use std::time::{Duration, Instant};

use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;

mod ata;

pub use ata::cached_associated_token_address;

/// open orders 账户缓存默认保鲜期。
pub const DEFAULT_OPEN_ORDERS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct OpenOrdersEntry {
    accounts: Vec<Pubkey>,
    /// `None` 表示条目已失效，下一次查询必须回源。
    fetched_at: Option<Instant>,
}

/// 按 `(owner, market)` 缓存 open orders 账户地址。
#[derive(Debug)]
pub struct OpenOrdersCache {
    ttl: Duration,
    entries: DashMap<(Pubkey, Pubkey), OpenOrdersEntry>,
}

impl Default for OpenOrdersCache {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN_ORDERS_TTL)
    }
}

impl OpenOrdersCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// 仅在保鲜期内返回缓存内容。
    pub fn fresh_accounts(&self, owner: &Pubkey, market: &Pubkey) -> Option<Vec<Pubkey>> {
        let entry = self.entries.get(&(*owner, *market))?;
        let fetched_at = entry.fetched_at?;
        if fetched_at.elapsed() < self.ttl {
            Some(entry.accounts.clone())
        } else {
            None
        }
    }

    pub fn store(&self, owner: &Pubkey, market: &Pubkey, accounts: Vec<Pubkey>) {
        self.entries.insert(
            (*owner, *market),
            OpenOrdersEntry {
                accounts,
                fetched_at: Some(Instant::now()),
            },
        );
    }

    /// 创建指令发出后立刻失效时间戳，避免相信尚未落地的账户。
    pub fn mark_stale(&self, owner: &Pubkey, market: &Pubkey) {
        if let Some(mut entry) = self.entries.get_mut(&(*owner, *market)) {
            entry.fetched_at = None;
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// swap info 账户一经创建地址不再变化，按 owner 无限期缓存。
#[derive(Debug, Default)]
pub struct SwapInfoCache {
    entries: DashMap<Pubkey, Pubkey>,
}

impl SwapInfoCache {
    pub fn get(&self, owner: &Pubkey) -> Option<Pubkey> {
        self.entries.get(owner).map(|entry| *entry)
    }

    pub fn insert(&self, owner: Pubkey, swap_info: Pubkey) {
        self.entries.insert(owner, swap_info);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
