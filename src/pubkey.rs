// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Re-encoding of card-held RSA public keys for the PKCS#15 layer.

use log::warn;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::{BigUint, RsaPublicKey};

use crate::error::Error;

/// Encodes a raw modulus/exponent pair as a PKCS#1 `RSAPublicKey` DER
/// structure.
pub(crate) fn encode_rsa_public_key(modulus: &[u8], exponent: &[u8]) -> Result<Vec<u8>, Error> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(modulus),
        BigUint::from_bytes_be(exponent),
    )
    .map_err(|err| {
        warn!("Card returned an unusable RSA public key: {err}");
        Error::ObjectNotValid
    })?;
    let der = key.to_pkcs1_der().map_err(|err| {
        warn!("Failed to encode RSA public key: {err}");
        Error::ObjectNotValid
    })?;
    Ok(der.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use hex_literal::hex;
    use rsa::pkcs1::DecodeRsaPublicKey;
    use rsa::traits::PublicKeyParts;
    use test_log::test;

    const MODULUS: [u8; 64] = hex!(
        "c2b0 9c84 41d1 4c62 4d5b 2a57 19f8 37bc
         0d7e 68a3 81cf 64c9 2f3e 55d0 1b63 9b21
         9a77 0d34 52c8 1e4f a2d9 03b5 68e1 77f0
         4c3a 9d12 66fe 8b05 d71c 2ea4 30b9 5e8f"
    );
    const EXPONENT: [u8; 3] = hex!("010001");

    #[test]
    fn encodes_pkcs1_der() {
        let der = encode_rsa_public_key(&MODULUS, &EXPONENT).unwrap();
        // outer SEQUENCE
        assert_eq!(der[0], 0x30);
        let key = RsaPublicKey::from_pkcs1_der(&der).unwrap();
        assert_eq!(key.n().to_bytes_be(), MODULUS);
        assert_eq!(key.e().to_bytes_be(), EXPONENT);
    }

    #[test]
    fn rejects_garbage() {
        // a public exponent of 1 is not an RSA key
        assert_eq!(
            encode_rsa_public_key(&MODULUS, &hex!("01")),
            Err(Error::ObjectNotValid)
        );
    }
}
