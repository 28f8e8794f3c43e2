//! Transaction classifier.
//!
//! Maps a [`TransactionRecord`] to a [`Category`] by walking a fixed list of
//! rules in priority order. The first matching rule wins:
//!
//! 1. no recipient (or the zero address)          → `contractDeploy`
//! 2. no calldata                                 → `transfer`
//! 3. well-formed ERC-20 `transfer`/`transferFrom`, or `approve` → `transfer`
//! 4. curated DeFi selector, or value + payable DeFi selector   → `defi`
//! 5. curated NFT selector, or NFT transfer heuristic           → `nft`
//! 6. calldata longer than a bare selector        → `contractCall`
//! 7. anything else                               → `other`
//!
//! The DeFi/NFT rules are selector-table heuristics, not ABI decoding.

use std::collections::BTreeMap;

use chainfeed_core::units::ZERO_ADDRESS;
use chainfeed_core::{Category, ClassificationResult, ClassifiedTransaction, TransactionRecord};

use crate::selectors::{
    self, ERC20_APPROVE, ERC20_TRANSFER, ERC20_TRANSFER_FROM, ERC20_TRANSFER_FROM_LEN,
    ERC20_TRANSFER_LEN, PAYABLE_DEFI, SELECTOR_HEX_LEN,
};

/// Hex characters in one ABI word.
const WORD_HEX_LEN: usize = 64;
/// Leading zero hex characters of an ABI-encoded address word.
const ADDRESS_PAD_HEX_LEN: usize = 24;

/// Lifetime count per category.
pub type CategoryCounts = BTreeMap<Category, u64>;

/// Pure categorisation of a single transaction. Never fails.
pub fn categorize(tx: &TransactionRecord) -> Category {
    let is_deploy = match tx.to.as_deref() {
        None => true,
        Some(to) => to.is_empty() || to.eq_ignore_ascii_case(ZERO_ADDRESS),
    };
    if is_deploy {
        return Category::ContractDeploy;
    }

    let input = tx.input.as_deref().unwrap_or("").trim();
    let payload_len = payload_bytes(input);
    if payload_len == 0 {
        return Category::Transfer;
    }

    let selector = input
        .get(..SELECTOR_HEX_LEN)
        .unwrap_or(input)
        .to_ascii_lowercase();

    if is_erc20_call(&selector, payload_len) {
        return Category::Transfer;
    }

    if selectors::defi_group(&selector).is_some()
        || (tx.has_value() && PAYABLE_DEFI.contains(&selector))
    {
        return Category::Defi;
    }

    if selectors::nft_group(&selector).is_some() || looks_like_nft_transfer(tx, input) {
        return Category::Nft;
    }

    if input.len() > SELECTOR_HEX_LEN {
        return Category::ContractCall;
    }

    Category::Other
}

/// Calldata length in bytes, ignoring the `0x` prefix.
fn payload_bytes(input: &str) -> usize {
    input.strip_prefix("0x").unwrap_or(input).len() / 2
}

fn is_erc20_call(selector: &str, payload_len: usize) -> bool {
    match selector {
        ERC20_TRANSFER => payload_len == ERC20_TRANSFER_LEN,
        ERC20_TRANSFER_FROM => payload_len == ERC20_TRANSFER_FROM_LEN,
        ERC20_APPROVE => true,
        _ => false,
    }
}

/// Zero-value call whose first two arguments are addresses followed by at
/// least one more word: the `(from, to, tokenId, ...)` shape of marketplace
/// and collection-specific NFT transfers.
fn looks_like_nft_transfer(tx: &TransactionRecord, input: &str) -> bool {
    if tx.has_value() {
        return false;
    }
    let Some(args) = input.get(SELECTOR_HEX_LEN..) else {
        return false;
    };
    if args.len() < 3 * WORD_HEX_LEN {
        return false;
    }
    (0..2).all(|i| {
        args.get(i * WORD_HEX_LEN..(i + 1) * WORD_HEX_LEN)
            .is_some_and(is_address_word)
    })
}

fn is_address_word(word: &str) -> bool {
    let (Some(pad), Some(addr)) = (word.get(..ADDRESS_PAD_HEX_LEN), word.get(ADDRESS_PAD_HEX_LEN..)) else {
        return false;
    };
    pad.bytes().all(|b| b == b'0')
        && addr.bytes().all(|b| b.is_ascii_hexdigit())
        && addr.bytes().any(|b| b != b'0')
}

/// Classifier with running per-category counters.
#[derive(Debug, Clone, Default)]
pub struct TransactionClassifier {
    counts: [u64; Category::ALL.len()],
}

impl TransactionClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `tx` and count the result.
    pub fn classify(&mut self, tx: &TransactionRecord) -> ClassificationResult {
        let category = categorize(tx);
        self.counts[category.index()] += 1;
        tracing::trace!(hash = %tx.hash, %category, "classified transaction");
        category.into()
    }

    /// Classify and attach the display metadata to the record.
    pub fn analyze(&mut self, tx: TransactionRecord) -> ClassifiedTransaction {
        let classification = self.classify(&tx);
        ClassifiedTransaction { tx, classification }
    }

    /// Lifetime counts for every category (zeros included).
    pub fn stats(&self) -> CategoryCounts {
        Category::ALL
            .into_iter()
            .map(|c| (c, self.counts[c.index()]))
            .collect()
    }

    pub fn count(&self, category: Category) -> u64 {
        self.counts[category.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Integer share of each category, rounded to nearest.
    ///
    /// Empty until the first classification.
    pub fn percentages(&self) -> BTreeMap<Category, u32> {
        let total = self.total();
        if total == 0 {
            return BTreeMap::new();
        }
        Category::ALL
            .into_iter()
            .map(|c| {
                let pct = self.counts[c.index()] as f64 * 100.0 / total as f64;
                (c, pct.round() as u32)
            })
            .collect()
    }

    /// Category with the highest count; ties go to the earlier category.
    /// Returns `(Other, 0)` before anything has been classified.
    pub fn most_active(&self) -> (Category, u64) {
        let mut best = (Category::Other, 0);
        for c in Category::ALL {
            let n = self.counts[c.index()];
            if n > best.1 {
                best = (c, n);
            }
        }
        best
    }

    pub fn reset(&mut self) {
        self.counts = [0; Category::ALL.len()];
    }
}
