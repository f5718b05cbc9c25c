// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Command APDUs for the OpenPGP card, see § 7 of the card specs.

/// Class byte used for all OpenPGP card commands.
const CLA: u8 = 0x00;

/// A command APDU ready for transmission.
///
/// `le` is the number of response bytes the driver expects. The wire
/// encoding is picked by [`Apdu::to_bytes`] from the card's extended length
/// capability and the operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    /// Class byte.
    pub cla: u8,
    /// Instruction byte.
    pub ins: u8,
    /// First parameter byte.
    pub p1: u8,
    /// Second parameter byte.
    pub p2: u8,
    /// Command data field.
    pub data: Vec<u8>,
    /// Expected response length; 0 if no response data is expected.
    pub le: usize,
}

impl Apdu {
    fn new(ins: u8, p1: u8, p2: u8, data: Vec<u8>, le: usize) -> Self {
        Self {
            cla: CLA,
            ins,
            p1,
            p2,
            data,
            le,
        }
    }

    /// True if the operands do not fit the short form.
    fn requires_extended(&self) -> bool {
        self.data.len() > 255 || self.le > 256
    }

    /// Serializes the command for the wire.
    ///
    /// `extended` is the card's extended length capability: the extended
    /// form is used iff the card supports it and the operands need it.
    /// Cards without the capability must only be handed commands that fit
    /// the short form.
    pub fn to_bytes(&self, extended: bool) -> Vec<u8> {
        let mut out = vec![self.cla, self.ins, self.p1, self.p2];
        if extended && self.requires_extended() {
            out.push(0x00);
            if !self.data.is_empty() {
                out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
                out.extend_from_slice(&self.data);
            }
            if self.le > 0 {
                // an Le of 65536 is encoded as 0000
                out.extend_from_slice(&(self.le as u16).to_be_bytes());
            }
        } else {
            if !self.data.is_empty() {
                out.push(self.data.len() as u8);
                out.extend_from_slice(&self.data);
            }
            if self.le > 0 {
                // an Le of 256 is encoded as 00
                out.push(self.le as u8);
            }
        }
        out
    }
}

/// Expected response length for a response buffer of `buf_len` bytes.
///
/// Cards without extended length support cannot answer with more than 256
/// bytes in one exchange, so Le is capped accordingly.
fn expected_len(buf_len: usize, extended: bool) -> usize {
    if buf_len >= 256 && !extended {
        256
    } else {
        buf_len
    }
}

/// GET DATA, § 7.2.6
pub(crate) fn get_data(tag: u16, buf_len: usize, extended: bool) -> Apdu {
    let [p1, p2] = tag.to_be_bytes();
    Apdu::new(0xCA, p1, p2, Vec::new(), expected_len(buf_len, extended))
}

/// Read variant of GENERATE ASYMMETRIC KEY PAIR, § 7.2.14
pub(crate) fn read_public_key(tag: u16, buf_len: usize, extended: bool) -> Apdu {
    Apdu::new(
        0x47,
        0x81,
        0x00,
        tag.to_be_bytes().to_vec(),
        expected_len(buf_len, extended),
    )
}

/// PSO: COMPUTE DIGITAL SIGNATURE, § 7.2.10
pub(crate) fn compute_signature(data: &[u8], buf_len: usize, extended: bool) -> Apdu {
    Apdu::new(
        0x2A,
        0x9E,
        0x9A,
        data.to_vec(),
        expected_len(buf_len, extended),
    )
}

/// PSO: DECIPHER, § 7.2.11
///
/// The card wants a padding indicator byte prepended to the ciphertext; the
/// driver owns this framing, callers pass the bare ciphertext.
pub(crate) fn decipher(ciphertext: &[u8], buf_len: usize, extended: bool) -> Apdu {
    let mut data = Vec::with_capacity(ciphertext.len() + 1);
    data.push(0x00);
    data.extend_from_slice(ciphertext);
    Apdu::new(0x2A, 0x80, 0x86, data, expected_len(buf_len, extended))
}

/// INTERNAL AUTHENTICATE, § 7.2.13
pub(crate) fn internal_authenticate(challenge: &[u8], buf_len: usize, extended: bool) -> Apdu {
    Apdu::new(
        0x88,
        0x00,
        0x00,
        challenge.to_vec(),
        expected_len(buf_len, extended),
    )
}
