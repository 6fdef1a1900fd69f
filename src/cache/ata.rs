use dashmap::DashMap;
use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AtaKey {
    owner: Pubkey,
    mint: Pubkey,
}

static ATA_CACHE: Lazy<DashMap<AtaKey, Pubkey>> = Lazy::new(DashMap::new);

/// 返回缓存的 ATA 地址，未命中时派生并写入缓存。
pub fn cached_associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let key = AtaKey {
        owner: *owner,
        mint: *mint,
    };
    if let Some(entry) = ATA_CACHE.get(&key) {
        return *entry;
    }
    let token_program = spl_token::ID;
    let address = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &spl_associated_token_account::ID,
    )
    .0;
    ATA_CACHE.insert(key, address);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_stable() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let first = cached_associated_token_address(&owner, &mint);
        let second = cached_associated_token_address(&owner, &mint);
        assert_eq!(first, second);
        assert_ne!(first, cached_associated_token_address(&mint, &owner));
    }
}
