//! Curated 4-byte function selector tables.
//!
//! Selectors are kept as lower-case `0x`-prefixed hex so they compare
//! directly against the first ten characters of calldata.
//!
//! Some selectors appear in more than one table (`transferFrom` is both an
//! ERC-20 and an ERC-721 call). The classifier resolves overlaps by rule
//! priority, not by table membership.

/// A named group of selectors.
#[derive(Debug, Clone, Copy)]
pub struct SelectorGroup {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
}

impl SelectorGroup {
    pub fn contains(&self, selector: &str) -> bool {
        self.selectors.contains(&selector)
    }
}

/// Length of a selector including the `0x` prefix.
pub const SELECTOR_HEX_LEN: usize = 10;

// ─── ERC-20 ───────────────────────────────────────────────────────────────────

/// `transfer(address,uint256)`
pub const ERC20_TRANSFER: &str = "0xa9059cbb";
/// `transferFrom(address,address,uint256)`
pub const ERC20_TRANSFER_FROM: &str = "0x23b872dd";
/// `approve(address,uint256)`
pub const ERC20_APPROVE: &str = "0x095ea7b3";

/// Calldata bytes for a well-formed `transfer`: selector + 2 words.
pub const ERC20_TRANSFER_LEN: usize = 4 + 2 * 32;
/// Calldata bytes for a well-formed `transferFrom`: selector + 3 words.
pub const ERC20_TRANSFER_FROM_LEN: usize = 4 + 3 * 32;

// ─── DeFi ─────────────────────────────────────────────────────────────────────

pub const DEFI_SWAP: SelectorGroup = SelectorGroup {
    name: "swap",
    selectors: &[
        "0xa9059cbb", // transfer
        "0x23b872dd", // transferFrom
        "0x095ea7b3", // approve
        "0x7ff36ab5", // swapExactETHForTokens
        "0x38ed1739", // swapExactTokensForTokens
    ],
};

pub const DEFI_STAKE: SelectorGroup = SelectorGroup {
    name: "stake",
    selectors: &[
        "0xa694fc3a", // stake(uint256)
        "0x2e1a7d4d", // withdraw(uint256)
        "0x3ccfd60b", // withdraw()
        "0xb6b55f25", // deposit(uint256)
    ],
};

pub const DEFI_LIQUIDITY: SelectorGroup = SelectorGroup {
    name: "liquidity",
    selectors: &[
        "0xe8e33700", // addLiquidity
        "0xbaa2abde", // removeLiquidity
        "0x4515cef3", // add_liquidity
        "0x02751cec", // removeLiquidityETH
    ],
};

pub const DEFI_LENDING: SelectorGroup = SelectorGroup {
    name: "lending",
    selectors: &[
        "0x1249c58b", // mint()
        "0xa415bcad", // borrow
        "0x69328dec", // withdraw(address,uint256,address)
        "0x573ade81", // repay
    ],
};

pub const DEFI_GROUPS: [SelectorGroup; 4] = [DEFI_SWAP, DEFI_STAKE, DEFI_LIQUIDITY, DEFI_LENDING];

/// Payable entry points that only count as DeFi when they carry native value.
pub const PAYABLE_DEFI: SelectorGroup = SelectorGroup {
    name: "payable",
    selectors: &[
        "0xd0e30db0", // deposit() (wrapped native)
        "0xf305d719", // addLiquidityETH
        "0xfb3bdb41", // swapETHForExactTokens
        "0xb6f9de95", // swapExactETHForTokensSupportingFeeOnTransferTokens
        "0x5ae401dc", // multicall(uint256,bytes[])
        "0xac9650d8", // multicall(bytes[])
    ],
};

// ─── NFT ──────────────────────────────────────────────────────────────────────

pub const NFT_MINT: SelectorGroup = SelectorGroup {
    name: "mint",
    selectors: &[
        "0x40c10f19", // mint(address,uint256)
        "0xa0712d68", // mint(uint256)
        "0x6a627842", // mint(address)
        "0x42842e0e", // safeTransferFrom(address,address,uint256)
    ],
};

pub const NFT_TRANSFER: SelectorGroup = SelectorGroup {
    name: "transfer",
    selectors: &[
        "0x23b872dd", // transferFrom
        "0x42842e0e", // safeTransferFrom
        "0xb88d4fde", // safeTransferFrom with data
        "0xa22cb465", // setApprovalForAll
    ],
};

pub const NFT_SELL: SelectorGroup = SelectorGroup {
    name: "sell",
    selectors: &[
        "0x96b5a755", // cancelOrder
        "0xfb0f3ee1", // fulfillBasicOrder
        "0x3593564c", // execute (universal router)
        "0xab834bab", // atomicMatch_
    ],
};

pub const NFT_APPROVE: SelectorGroup = SelectorGroup {
    name: "approve",
    selectors: &[
        "0x095ea7b3", // approve
        "0xa22cb465", // setApprovalForAll
        "0x40c10f19", // mint(address,uint256)
    ],
};

pub const NFT_GROUPS: [SelectorGroup; 4] = [NFT_MINT, NFT_TRANSFER, NFT_SELL, NFT_APPROVE];

/// Name of the first DeFi group containing `selector`.
pub fn defi_group(selector: &str) -> Option<&'static str> {
    DEFI_GROUPS.iter().find(|g| g.contains(selector)).map(|g| g.name)
}

/// Name of the first NFT group containing `selector`.
pub fn nft_group(selector: &str) -> Option<&'static str> {
    NFT_GROUPS.iter().find(|g| g.contains(selector)).map(|g| g.name)
}
