use solana_sdk::pubkey::Pubkey;

/// 主网 chain id，token-list 与路由服务均以此区分网络。
pub const CHAIN_ID: u16 = 101;

/// 聚合协议链上程序。
pub const AGGREGATOR_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("1SoLTvbiicqXZ3MJmnTL2WYXKLYpuxwHpa4yYrVQaMZ");

pub const SERUM_DEX_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
pub const SABER_STABLE_SWAP_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("SSwpkEEcbUqx4vtoEByFjSkhKdCT862DNVb52nZg1UZ");
pub const ORCA_SWAP_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP");
pub const RAYDIUM_V4_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");
pub const ONE_MOON_SWAP_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("1MooN32fuBBgApc8ujknKJw5sef3BVwPGgz3pto1BAh");
pub const TOKEN_SWAP_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("SwaPpA9LAaLfeLi3a68M4DjnLqgtticKg6CnyNwgAC8");

pub const WSOL_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");

pub const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");

/// 默认路由服务入口。
pub const DEFAULT_ROUTER_BASE_URL: &str = "https://api.1sol.io/1";

/// 路由服务默认携带的程序白名单。
pub const SUPPORTED_PROGRAM_IDS: &[Pubkey] = &[
    TOKEN_SWAP_PROGRAM_ID,
    SERUM_DEX_PROGRAM_ID,
    SABER_STABLE_SWAP_PROGRAM_ID,
    ORCA_SWAP_PROGRAM_ID,
    RAYDIUM_V4_PROGRAM_ID,
    ONE_MOON_SWAP_PROGRAM_ID,
];
