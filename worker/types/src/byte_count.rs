// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Volume sizes expressed as Kubernetes-style quantities

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A size in bytes, parsed from a human-readable quantity such as `50Gi`.
///
/// Binary suffixes (`Ki`, `Mi`, `Gi`, `Ti`, `Pi`, `Ei`) and decimal suffixes
/// (`k`, `M`, `G`, `T`, `P`, `E`) are accepted, as is a bare number of bytes.
/// A fractional quantity is rounded up to the next whole byte.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
)]
#[serde(transparent)]
pub struct ByteCount(u64);

impl ByteCount {
    pub const fn from_bytes(bytes: u64) -> ByteCount {
        ByteCount(bytes)
    }

    pub const fn from_gibibytes_u32(gibibytes: u32) -> ByteCount {
        ByteCount(1024 * 1024 * 1024 * gibibytes as u64)
    }

    pub fn to_bytes(&self) -> u64 {
        self.0
    }

    pub fn to_whole_gibibytes(&self) -> u64 {
        self.to_bytes() / 1024 / 1024 / 1024
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ByteCountParseError {
    #[error("size is empty")]
    Empty,
    #[error("invalid number {0:?} in size")]
    InvalidNumber(String),
    #[error("unknown size suffix {0:?}")]
    UnknownSuffix(String),
    #[error("size {0:?} does not fit in 64 bits")]
    TooLarge(String),
}

fn suffix_multiplier(suffix: &str) -> Option<u128> {
    let m = match suffix {
        "" => 1,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        "Pi" => 1 << 50,
        "Ei" => 1 << 60,
        "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "P" => 1_000_000_000_000_000,
        "E" => 1_000_000_000_000_000_000,
        _ => return None,
    };
    Some(m)
}

impl FromStr for ByteCount {
    type Err = ByteCountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ByteCountParseError::Empty);
        }

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        let multiplier = suffix_multiplier(suffix).ok_or_else(|| {
            ByteCountParseError::UnknownSuffix(suffix.to_string())
        })?;

        let invalid = || ByteCountParseError::InvalidNumber(number.to_string());
        let too_large = || ByteCountParseError::TooLarge(s.to_string());

        let (whole, fraction) = match number.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        // Anything past 18 fractional digits cannot change a u64 result after
        // rounding up, except through the "is there a remainder" check below.
        if fraction.contains('.') || fraction.len() > 18 {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| too_large())?
        };
        let mut bytes = whole.checked_mul(multiplier).ok_or_else(too_large)?;

        if !fraction.is_empty() {
            let numerator: u128 = fraction.parse().map_err(|_| invalid())?;
            let denominator = 10u128.pow(fraction.len() as u32);
            let scaled =
                numerator.checked_mul(multiplier).ok_or_else(too_large)?;
            bytes = bytes
                .checked_add(scaled.div_ceil(denominator))
                .ok_or_else(too_large)?;
        }

        u64::try_from(bytes).map(ByteCount::from_bytes).map_err(|_| too_large())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use test_strategy::proptest;

    #[test]
    fn test_parse_binary_suffixes() {
        assert_eq!(
            "50Gi".parse::<ByteCount>().unwrap(),
            ByteCount::from_gibibytes_u32(50)
        );
        assert_eq!(
            "512Mi".parse::<ByteCount>().unwrap().to_bytes(),
            512 * 1024 * 1024
        );
        assert_eq!(
            "1Ti".parse::<ByteCount>().unwrap().to_whole_gibibytes(),
            1024
        );
    }

    #[test]
    fn test_parse_decimal_and_plain() {
        assert_eq!(
            "100G".parse::<ByteCount>().unwrap(),
            ByteCount::from_bytes(100_000_000_000)
        );
        assert_eq!(
            "4096".parse::<ByteCount>().unwrap(),
            ByteCount::from_bytes(4096)
        );
        assert_eq!(
            " 20Gi ".parse::<ByteCount>().unwrap().to_whole_gibibytes(),
            20
        );
    }

    #[test]
    fn test_parse_fraction_rounds_up() {
        assert_eq!(
            "1.5Gi".parse::<ByteCount>().unwrap().to_bytes(),
            3 * 512 * 1024 * 1024
        );
        assert_eq!("0.5".parse::<ByteCount>().unwrap().to_bytes(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert_matches!(
            "".parse::<ByteCount>(),
            Err(ByteCountParseError::Empty)
        );
        assert_matches!(
            "Gi".parse::<ByteCount>(),
            Err(ByteCountParseError::InvalidNumber(_))
        );
        assert_matches!(
            "50GB".parse::<ByteCount>(),
            Err(ByteCountParseError::UnknownSuffix(s)) if s == "GB"
        );
        assert_matches!(
            "-5Gi".parse::<ByteCount>(),
            Err(ByteCountParseError::UnknownSuffix(_))
        );
        assert_matches!(
            "1.2.3Gi".parse::<ByteCount>(),
            Err(ByteCountParseError::InvalidNumber(_))
        );
        assert_matches!(
            "100000Ei".parse::<ByteCount>(),
            Err(ByteCountParseError::TooLarge(_))
        );
    }

    #[proptest]
    fn proptest_gibibytes_round_trip(gibibytes: u32) {
        let parsed: ByteCount = format!("{gibibytes}Gi").parse().unwrap();
        assert_eq!(parsed, ByteCount::from_gibibytes_u32(gibibytes));
    }
}
