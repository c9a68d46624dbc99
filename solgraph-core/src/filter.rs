use std::collections::HashSet;

/// Infrastructure addresses that never become graph nodes. Mostly system
/// and token programs plus sysvars that show up in nearly every transaction.
const EXCLUDED_ADDRESSES: &[&str] = &[
    "11111111111111111111111111111111",             // system program
    "ComputeBudget111111111111111111111111111111",  // compute budget
    "Vote111111111111111111111111111111111111111",  // vote program
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",  // token program
    "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",  // token-2022
    "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL", // associated token account
    "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo",  // memo
    "SysvarRent111111111111111111111111111111111",
    "SysvarC1ock11111111111111111111111111111111",
];

/// Program-id fragments matched as substrings against participants. Covers
/// the common swap/AMM and aggregator programs whose fan-out would swamp the
/// graph with routing noise.
const EXCLUDED_PROGRAM_FRAGMENTS: &[&str] = &[
    "JUP6Lkb",  // jupiter aggregator
    "675kPX9",  // raydium amm v4
    "CAMMCzo",  // raydium clmm
    "whirL",    // orca whirlpool
    "9xQeWvG",  // serum dex v3
    "srmqPvy",  // openbook
    "6EF8rre",  // pump.fun bonding curve
    "pAMMBay",  // pump swap
    "LBUZKhR",  // meteora dlmm
];

/// Known-pathological addresses the scheduler short-circuits without a
/// network call. Expanding these pulls in millions of unrelated rows.
const DENY_LISTED_ADDRESSES: &[&str] = &[
    "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1", // raydium amm authority
    "So11111111111111111111111111111111111111112",  // wrapped SOL mint
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", // USDC mint
    "5tzFkiKscXHK5ZXCGbXZxdw7gTjjD1mBwuoFbhUvuAi9", // exchange hot wallet
    "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM", // exchange hot wallet
];

/// Short-circuit check used by the fetch scheduler.
pub fn is_deny_listed(address: &str) -> bool {
    DENY_LISTED_ADDRESSES.contains(&address)
}

/// Decides which addresses may become nodes and which transactions are worth
/// materializing at all.
#[derive(Debug, Default, Clone)]
pub struct ExclusionFilter {
    extra: HashSet<String>,
}

impl ExclusionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add session-specific exclusions on top of the static tables.
    pub fn with_addresses<I: IntoIterator<Item = String>>(addresses: I) -> Self {
        Self {
            extra: addresses.into_iter().collect(),
        }
    }

    /// Whether `address` is barred from ever becoming a node.
    pub fn is_excluded(&self, address: &str) -> bool {
        EXCLUDED_ADDRESSES.contains(&address)
            || self.extra.contains(address)
            || EXCLUDED_PROGRAM_FRAGMENTS
                .iter()
                .any(|fragment| address.contains(fragment))
    }

    /// Inclusion predicate for whole transactions: anything routed through a
    /// swap/AMM program is dropped outright. Plain infrastructure addresses
    /// do not poison a transaction; they are only kept out of the node set.
    pub fn excludes_transaction(&self, participants: &[String]) -> bool {
        participants.iter().any(|participant| {
            EXCLUDED_PROGRAM_FRAGMENTS
                .iter()
                .any(|fragment| participant.contains(fragment))
        })
    }
}
