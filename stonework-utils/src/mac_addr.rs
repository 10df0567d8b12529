//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// 48-bit MAC address (IEEE EUI-48 format).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct MacAddr([u8; 6]);

/// Error type for MAC address parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseMacAddrError;

// ===== impl MacAddr =====

impl MacAddr {
    pub const LENGTH: usize = 6;

    // Prefix of generated addresses: locally administered, unicast.
    const LOCAL_PREFIX: [u8; 2] = [0x02, 0xfe];

    // Builds a locally administered unicast address whose lower four bytes
    // are taken from the given value.
    pub fn local(value: u32) -> MacAddr {
        let [b0, b1] = Self::LOCAL_PREFIX;
        let [b2, b3, b4, b5] = value.to_be_bytes();
        MacAddr([b0, b1, b2, b3, b4, b5])
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}

impl FromStr for MacAddr {
    type Err = ParseMacAddrError;

    /// Parse a MAC address from a string.
    ///
    /// Accepts formats:
    /// - Colon-separated: "aa:bb:cc:dd:ee:ff"
    /// - Hyphen-separated: "aa-bb-cc-dd-ee-ff"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') {
            ':'
        } else if s.contains('-') {
            '-'
        } else {
            return Err(ParseMacAddrError);
        };

        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(separator) {
            if count == Self::LENGTH || part.len() != 2 {
                return Err(ParseMacAddrError);
            }
            bytes[count] =
                u8::from_str_radix(part, 16).map_err(|_| ParseMacAddrError)?;
            count += 1;
        }
        if count != Self::LENGTH {
            return Err(ParseMacAddrError);
        }

        Ok(MacAddr(bytes))
    }
}

// ===== impl ParseMacAddrError =====

impl std::fmt::Display for ParseMacAddrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid MAC address format")
    }
}

impl std::error::Error for ParseMacAddrError {}

// ===== unit tests =====
