use std::str::FromStr;
use std::sync::LazyLock;

use alloy_primitives::{keccak256, Address, I256, U256};
use rust_decimal::Decimal;

use crate::errors::DecodeError;
use crate::ingestion::RawLog;
use crate::models::Direction;

/// Keccak256 topic for GMX Vault IncreasePosition.
pub static SIG_POSITION_OPEN: LazyLock<String> = LazyLock::new(|| {
    keccak256(
        b"IncreasePosition(address,address,address,uint256,uint256,uint256,uint256,uint256,uint256,bool,uint256)",
    )
    .to_string()
});

/// Keccak256 topic for GMX Vault DecreasePosition.
pub static SIG_POSITION_CLOSE: LazyLock<String> = LazyLock::new(|| {
    keccak256(
        b"DecreasePosition(address,address,address,uint256,uint256,uint256,uint256,uint256,uint256,uint256,int256,bool,uint256)",
    )
    .to_string()
});

/// GMX amounts are fixed-point with 30 decimals.
const PRICE_PRECISION_DECIMALS: u32 = 30;

/// Placeholder until multi-asset support lands; the vault feed we subscribe
/// to is the BTC index market.
const PLACEHOLDER_SYMBOL: &str = "BTC-USD";

const WORD_HEX_LEN: usize = 64;

/// Largest mantissa a Decimal can carry (96 bits).
const MAX_MANTISSA: i128 = 79_228_162_514_264_337_593_543_950_335;

/// Decoded IncreasePosition fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionOpen {
    pub symbol: String,
    pub size_usd: Decimal,
    pub leverage: Decimal,
    pub direction: Direction,
    pub tx_hash: String,
}

/// Decoded DecreasePosition fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionClose {
    pub size_usd: Decimal,
    pub pnl: Decimal,
    pub tx_hash: String,
}

/// Decode an IncreasePosition log: word 0 is the position size delta,
/// word 1 the leverage, both 1e30 fixed point.
pub fn decode_increase(log: &RawLog) -> Result<PositionOpen, DecodeError> {
    let size_usd = usd_from_1e30(data_word(&log.data, 0)?);
    let leverage = usd_from_1e30(data_word(&log.data, 1)?);

    Ok(PositionOpen {
        symbol: resolve_symbol(log),
        size_usd,
        leverage,
        direction: resolve_direction(log),
        tx_hash: log.tx_hash.clone(),
    })
}

/// Decode a DecreasePosition log: word 0 is the size delta, word 2 the
/// signed realized pnl.
pub fn decode_decrease(log: &RawLog) -> Result<PositionClose, DecodeError> {
    let size_usd = usd_from_1e30(data_word(&log.data, 0)?);
    let pnl = signed_usd_from_1e30(data_word(&log.data, 2)?);

    Ok(PositionClose {
        size_usd,
        pnl,
        tx_hash: log.tx_hash.clone(),
    })
}

// TODO: derive direction from the event's isLong word and symbol from the
// indexToken topic once multi-asset vault support is wired in.
fn resolve_direction(_log: &RawLog) -> Direction {
    Direction::Long
}

fn resolve_symbol(_log: &RawLog) -> String {
    PLACEHOLDER_SYMBOL.to_string()
}

/// Extract a 20-byte wallet address from a 32-byte zero-padded topic and
/// return it EIP-55 checksummed.
pub fn checksum_address(topic: &str) -> Option<String> {
    let hex = topic.strip_prefix("0x").unwrap_or(topic);
    if hex.len() < 40 {
        return None;
    }
    let tail = hex[hex.len() - 40..].to_lowercase();
    let addr = Address::from_str(&format!("0x{tail}")).ok()?;
    Some(addr.to_checksum(None))
}

/// Read the i-th 32-byte word out of a hex data blob. Errors only when the
/// blob is too short; non-hex garbage inside a full word reads as zero.
fn data_word(data: &str, index: usize) -> Result<U256, DecodeError> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    let end = (index + 1) * WORD_HEX_LEN;
    if hex.len() < end {
        return Err(DecodeError::DataTooShort {
            needed: end,
            got: hex.len(),
        });
    }
    Ok(U256::from_str_radix(&hex[index * WORD_HEX_LEN..end], 16).unwrap_or(U256::ZERO))
}

/// Scale a 1e30 fixed-point amount down to a Decimal dollar value. The
/// bottom 12 fractional digits are dropped so the result fits Decimal's
/// 96-bit mantissa (18 fractional digits survive).
fn usd_from_1e30(raw: U256) -> Decimal {
    let scaled = raw / U256::from(10u64).pow(U256::from(PRICE_PRECISION_DECIMALS - 18));
    let mantissa = u128::try_from(scaled).unwrap_or(u128::MAX);
    let mantissa = mantissa.min(MAX_MANTISSA as u128) as i128;
    Decimal::from_i128_with_scale(mantissa, 18)
}

/// Same scaling for an int256 word (realized pnl can be negative).
fn signed_usd_from_1e30(raw: U256) -> Decimal {
    let (sign, abs) = I256::from_raw(raw).into_sign_and_abs();
    let value = usd_from_1e30(abs);
    if sign.is_negative() {
        -value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_e30() -> U256 {
        U256::from(10u64).pow(U256::from(30u64))
    }

    fn word_hex(value: U256) -> String {
        format!("{value:064x}")
    }

    fn increase_log(size_usd: u64, leverage: u64) -> RawLog {
        let data = format!(
            "0x{}{}",
            word_hex(U256::from(size_usd) * one_e30()),
            word_hex(U256::from(leverage) * one_e30()),
        );
        RawLog {
            topics: vec![SIG_POSITION_OPEN.clone()],
            data,
            tx_hash: "0xabc123".into(),
        }
    }

    #[test]
    fn test_decode_increase_scales_by_1e30() {
        let log = increase_log(15_000, 10);
        let open = decode_increase(&log).expect("decode should succeed");

        assert_eq!(open.size_usd, Decimal::from(15_000));
        assert_eq!(open.leverage, Decimal::from(10));
        assert_eq!(open.direction, Direction::Long);
        assert_eq!(open.symbol, "BTC-USD");
        assert_eq!(open.tx_hash, "0xabc123");
    }

    #[test]
    fn test_decode_increase_fractional_size() {
        // 2.5 USD = 25 * 10^29
        let raw = U256::from(25u64) * U256::from(10u64).pow(U256::from(29u64));
        let data = format!("0x{}{}", word_hex(raw), word_hex(one_e30()));
        let log = RawLog {
            topics: vec![],
            data,
            tx_hash: String::new(),
        };

        let open = decode_increase(&log).expect("decode should succeed");
        assert_eq!(open.size_usd, Decimal::new(25, 1));
    }

    #[test]
    fn test_decode_decrease_negative_pnl() {
        let size = U256::from(8_000u64) * one_e30();
        let loss = U256::from(250u64) * one_e30();
        // int256 two's complement of -250e30
        let neg = (!loss).wrapping_add(U256::from(1u64));
        let data = format!(
            "0x{}{}{}",
            word_hex(size),
            word_hex(U256::ZERO),
            word_hex(neg),
        );
        let log = RawLog {
            topics: vec![],
            data,
            tx_hash: "0xdef".into(),
        };

        let close = decode_decrease(&log).expect("decode should succeed");
        assert_eq!(close.size_usd, Decimal::from(8_000));
        assert_eq!(close.pnl, Decimal::from(-250));
    }

    #[test]
    fn test_decode_decrease_positive_pnl() {
        let data = format!(
            "0x{}{}{}",
            word_hex(U256::from(5_000u64) * one_e30()),
            word_hex(U256::ZERO),
            word_hex(U256::from(120u64) * one_e30()),
        );
        let log = RawLog {
            topics: vec![],
            data,
            tx_hash: String::new(),
        };

        let close = decode_decrease(&log).expect("decode should succeed");
        assert_eq!(close.pnl, Decimal::from(120));
    }

    #[test]
    fn test_short_data_is_an_error() {
        let log = RawLog {
            topics: vec![],
            data: format!("0x{}", word_hex(one_e30())),
            tx_hash: String::new(),
        };

        // One word present, leverage needs two
        assert!(matches!(
            decode_increase(&log),
            Err(DecodeError::DataTooShort { needed: 128, .. })
        ));
        // Pnl needs three
        assert!(matches!(
            decode_decrease(&log),
            Err(DecodeError::DataTooShort { needed: 192, .. })
        ));
    }

    #[test]
    fn test_checksum_address_from_topic() {
        // EIP-55 test vector
        let topic = "0x0000000000000000000000005aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        assert_eq!(
            checksum_address(topic).as_deref(),
            Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
        );
    }

    #[test]
    fn test_checksum_address_rejects_short_topic() {
        assert_eq!(checksum_address("0xabcd"), None);
    }

    #[test]
    fn test_event_topics_are_distinct() {
        assert_ne!(*SIG_POSITION_OPEN, *SIG_POSITION_CLOSE);
        assert!(SIG_POSITION_OPEN.starts_with("0x"));
        assert_eq!(SIG_POSITION_OPEN.len(), 66);
    }
}
