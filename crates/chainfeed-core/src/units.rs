//! Hex quantity parsing and unit conversion at the RPC boundary.
//!
//! Numeric RPC fields are `0x`-prefixed base-16 quantities. Missing or
//! unparseable fields read as zero, matching how nodes omit optional fields.

use alloy_primitives::U256;

/// The all-zero address used by some nodes for contract creation.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Decimals of the native token's base unit (wei).
pub const NATIVE_DECIMALS: u32 = 18;

/// Fraction digits kept when rendering native values.
pub const NATIVE_FRACTION_DIGITS: u32 = 6;

const WEI_PER_GWEI: f64 = 1e9;

fn strip_hex(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse an optional hex quantity into `u64`, zero when absent or invalid.
pub fn parse_hex_u64(s: Option<&str>) -> u64 {
    s.and_then(|h| u64::from_str_radix(strip_hex(h), 16).ok())
        .unwrap_or(0)
}

/// Parse an optional hex quantity into `u128`, zero when absent or invalid.
pub fn parse_hex_u128(s: Option<&str>) -> u128 {
    s.and_then(|h| u128::from_str_radix(strip_hex(h), 16).ok())
        .unwrap_or(0)
}

/// Parse an optional hex quantity into `U256`, zero when absent or invalid.
pub fn parse_hex_u256(s: Option<&str>) -> U256 {
    s.map(strip_hex)
        .filter(|h| !h.is_empty())
        .and_then(|h| U256::from_str_radix(h, 16).ok())
        .unwrap_or(U256::ZERO)
}

/// Returns `true` for a `0x`-prefixed string of hex digits (at least one).
pub fn is_hex_string(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Render a base-unit integer as a decimal string with `fraction_digits`
/// digits, rounding half-up.
///
/// `format_units(1_500_000_000_000_000_000, 18, 6) == "1.500000"`.
pub fn format_units(value: U256, decimals: u32, fraction_digits: u32) -> String {
    let fraction_digits = fraction_digits.min(decimals);
    let scale = U256::from(10u64).pow(U256::from(decimals - fraction_digits));
    let mut scaled = value / scale;
    let remainder = value % scale;
    if scale > U256::from(1u64) && remainder * U256::from(2u64) >= scale {
        scaled = scaled.saturating_add(U256::from(1u64));
    }
    if fraction_digits == 0 {
        return scaled.to_string();
    }
    let unit = U256::from(10u64).pow(U256::from(fraction_digits));
    let whole = scaled / unit;
    let frac = scaled % unit;
    format!(
        "{whole}.{frac:0>width$}",
        frac = frac.to_string(),
        width = fraction_digits as usize
    )
}

/// Wei → native token, six fraction digits.
pub fn wei_to_native(value: U256) -> String {
    format_units(value, NATIVE_DECIMALS, NATIVE_FRACTION_DIGITS)
}

/// Wei → gwei.
pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
