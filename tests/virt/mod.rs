// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only
#![allow(unused)]

use std::collections::BTreeMap;

use hex_literal::hex;
use iso7816::Status;
use opdriver::backend::{Iso7816, PinRequest, PinResponse};
use opdriver::{Apdu, Card, Error, AID};

pub const ATR_V1: &[u8] = &hex!("3b fa 13 00 ff 81 31 80 45 00 31 c1 73 c0 01 00 00 90 00 b1");
pub const ATR_V2: &[u8] = &hex!("3b da 18 ff 81 b1 fe 75 1f 03 00 31 c5 73 c0 01 40 00 90 00 0c");

/// DF name of the virtual card: the full AID with version 2.0, manufacturer
/// 0005 and serial number 00001F47.
pub const DF_NAME: [u8; 16] = hex!("D2 76 00 01 24 01 02 00 00 05 00 00 1F 47 00 00");

/// Manufacturer id and serial number as the driver extracts them.
pub const SERIAL: [u8; 6] = hex!("00 05 00 00 1F 47");

pub const PW_STATUS: [u8; 7] = hex!("00 20 20 20 03 00 03");
pub const EXTENDED_CAPS: [u8; 10] = hex!("7C 00 08 00 08 00 08 00 08 00");
pub const HISTORICAL: [u8; 8] = hex!("00 73 00 00 40 05 90 00");

pub const TEST_MODULUS: [u8; 64] = hex!(
    "c2b0 9c84 41d1 4c62 4d5b 2a57 19f8 37bc
     0d7e 68a3 81cf 64c9 2f3e 55d0 1b63 9b21
     9a77 0d34 52c8 1e4f a2d9 03b5 68e1 77f0
     4c3a 9d12 66fe 8b05 d71c 2ea4 30b9 5e8f"
);
pub const TEST_EXPONENT: [u8; 3] = hex!("01 00 01");

/// Encodes one BER-TLV data object.
pub fn tlv(tag: u16, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if tag > 0xFF {
        out.push((tag >> 8) as u8);
    }
    out.push(tag as u8);
    if value.len() <= 0x7F {
        out.push(value.len() as u8);
    } else if value.len() <= 0xFF {
        out.extend_from_slice(&[0x81, value.len() as u8]);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(value);
    out
}

/// An in-memory OpenPGP card speaking the subset of commands the driver
/// emits.  Everything transmitted is recorded for inspection.
#[derive(Debug)]
pub struct VirtCard {
    atr: &'static [u8],
    pub dos: BTreeMap<u16, Vec<u8>>,
    pub pubkeys: BTreeMap<u16, Vec<u8>>,
    pub df_name: Vec<u8>,
    pub transmitted: Vec<Apdu>,
    pub get_data_count: BTreeMap<u16, usize>,
    pub selected_aids: Vec<Vec<u8>>,
    pub pin_references: Vec<u8>,
}

impl VirtCard {
    pub fn v1() -> Self {
        Self::with_atr(ATR_V1)
    }

    pub fn v2() -> Self {
        Self::with_atr(ATR_V2)
    }

    pub fn with_atr(atr: &'static [u8]) -> Self {
        let discretionary = [tlv(0x00C0, &EXTENDED_CAPS), tlv(0x00C4, &PW_STATUS)].concat();
        let application_data = [
            tlv(0x004F, &DF_NAME),
            tlv(0x5F52, &HISTORICAL),
            tlv(0x0073, &discretionary),
        ]
        .concat();

        let mut dos = BTreeMap::new();
        dos.insert(0x004F, DF_NAME.to_vec());
        dos.insert(0x5F52, HISTORICAL.to_vec());
        dos.insert(0x00C4, PW_STATUS.to_vec());
        dos.insert(0x006E, application_data);
        dos.insert(0x0065, [tlv(0x005B, b"Kirch<<Olaf"), tlv(0x5F2D, b"de")].concat());
        dos.insert(0x007A, tlv(0x0093, &hex!("000029")));
        dos.insert(0x5F50, b"https://example.com/key.asc".to_vec());

        let template = [tlv(0x0081, &TEST_MODULUS), tlv(0x0082, &TEST_EXPONENT)].concat();
        let mut pubkeys = BTreeMap::new();
        pubkeys.insert(0xB600, tlv(0x7F49, &template));

        Self {
            atr,
            dos,
            pubkeys,
            df_name: DF_NAME.to_vec(),
            transmitted: Vec::new(),
            get_data_count: BTreeMap::new(),
            selected_aids: Vec::new(),
            pin_references: Vec::new(),
        }
    }
}

impl Iso7816 for VirtCard {
    fn atr(&self) -> &[u8] {
        self.atr
    }

    fn transmit_apdu(&mut self, apdu: &Apdu) -> Result<Vec<u8>, Error> {
        self.transmitted.push(apdu.clone());
        match (apdu.ins, apdu.p1, apdu.p2) {
            (0xCA, p1, p2) => {
                let tag = u16::from_be_bytes([p1, p2]);
                *self.get_data_count.entry(tag).or_insert(0) += 1;
                self.dos
                    .get(&tag)
                    .cloned()
                    .ok_or(Error::Card(Status::NotFound))
            }
            (0x47, 0x81, 0x00) => {
                let tag = u16::from_be_bytes([apdu.data[0], apdu.data[1]]);
                self.pubkeys
                    .get(&tag)
                    .cloned()
                    .ok_or(Error::Card(Status::KeyReferenceNotFound))
            }
            (0x2A, 0x9E, 0x9A) => Ok(vec![0x5A; 64]),
            (0x88, 0x00, 0x00) => Ok(vec![0xA5; 64]),
            // echo the cryptogram without the padding indicator
            (0x2A, 0x80, 0x86) => Ok(apdu.data[1..].to_vec()),
            _ => Err(Error::Card(Status::InstructionNotSupportedOrInvalid)),
        }
    }

    fn select_aid(&mut self, aid: &[u8]) -> Result<Vec<u8>, Error> {
        self.selected_aids.push(aid.to_vec());
        if aid == AID.as_slice() {
            Ok(self.df_name.clone())
        } else {
            Err(Error::Card(Status::NotFound))
        }
    }

    fn pin_cmd(&mut self, request: &PinRequest<'_>) -> Result<PinResponse, Error> {
        self.pin_references.push(request.reference);
        Ok(PinResponse {
            tries_left: Some(3),
        })
    }
}

pub fn with_card<F: FnOnce(Card<VirtCard>)>(virt: VirtCard, f: F) {
    f(Card::new(virt).expect("failed to open the driver session"));
}
