// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Card recognition and capability discovery from the answer-to-reset.

use hex_literal::hex;

use crate::types::CardType;

#[derive(Debug, Clone, Copy)]
pub(crate) struct AtrInfo {
    pub atr: &'static [u8],
    pub name: &'static str,
    pub card_type: CardType,
}

const ATR_V1: [u8; 20] = hex!("3b fa 13 00 ff 81 31 80 45 00 31 c1 73 c0 01 00 00 90 00 b1");
const ATR_V2: [u8; 21] = hex!("3b da 18 ff 81 b1 fe 75 1f 03 00 31 c5 73 c0 01 40 00 90 00 0c");

pub(crate) static KNOWN_ATRS: &[AtrInfo] = &[
    AtrInfo {
        atr: &ATR_V1,
        name: "OpenPGP card v1.0/1.1",
        card_type: CardType::OpenPgpV1,
    },
    AtrInfo {
        atr: &ATR_V2,
        name: "CryptoStick v1.2 (OpenPGP v2.0)",
        card_type: CardType::OpenPgpV2,
    },
];

pub(crate) fn match_atr(atr: &[u8]) -> Option<&'static AtrInfo> {
    KNOWN_ATRS.iter().find(|info| info.atr == atr)
}

/// Checks the card capabilities in the historical bytes.
///
/// Bit 0x40 in the third byte following the 0x73 compact-TLV header means
/// "extended Lc/Le", card specs § 6.
pub(crate) fn supports_extended_apdu(atr: &[u8]) -> bool {
    let Some(i) = atr.iter().position(|&b| b == 0x73) else {
        return false;
    };
    atr.len() > i + 3 && atr[i + 3] & 0x40 != 0
}
