use crate::error::Base62Error;
use curtail_flake::ShortId;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;
use std::str::FromStr;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: u64 = 62;

// A u64 never needs more than 11 base62 digits.
const MAX_DIGITS: usize = 11;

/// Encodes a value as base62, most significant digit first, no padding.
///
/// Zero encodes as `"0"`.
pub fn encode(value: u64) -> SmolStr {
    if value == 0 {
        return SmolStr::new_static("0");
    }
    let mut digits = [0u8; MAX_DIGITS];
    let mut idx = digits.len();
    let mut rest = value;
    while rest > 0 {
        idx -= 1;
        digits[idx] = ALPHABET[(rest % BASE) as usize];
        rest /= BASE;
    }
    SmolStr::new(std::str::from_utf8(&digits[idx..]).expect("alphabet is ascii"))
}

/// Decodes a base62 string back to the value it encodes.
pub fn decode(input: &str) -> Result<u64, Base62Error> {
    if input.is_empty() {
        return Err(Base62Error::Empty);
    }
    let mut value: u64 = 0;
    for (position, char) in input.chars().enumerate() {
        let digit = digit_value(char).ok_or(Base62Error::InvalidChar { char, position })?;
        value = value
            .checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(Base62Error::Overflow)?;
    }
    Ok(value)
}

fn digit_value(c: char) -> Option<u64> {
    match c {
        '0'..='9' => Some(c as u64 - '0' as u64),
        'A'..='Z' => Some(c as u64 - 'A' as u64 + 10),
        'a'..='z' => Some(c as u64 - 'a' as u64 + 36),
        _ => None,
    }
}

/// A short code produced by base62-encoding a 64-bit id.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Base62Code(SmolStr);

impl Base62Code {
    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the code back to the id value it encodes.
    pub fn value(&self) -> u64 {
        decode(&self.0).expect("constructed from a valid encoding")
    }
}

impl From<ShortId> for Base62Code {
    fn from(id: ShortId) -> Self {
        Self(encode(id.as_u64()))
    }
}

impl FromStr for Base62Code {
    type Err = Base62Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)?;
        Ok(Self(SmolStr::new(s)))
    }
}

impl std::fmt::Debug for Base62Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Base62Code").field(&self.0).finish()
    }
}

impl Display for Base62Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Base62Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Base62Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = SmolStr::deserialize(deserializer)?;
        decode(&s).map_err(serde::de::Error::custom)?;
        Ok(Self(s))
    }
}
