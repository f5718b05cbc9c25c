// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! This crate implements the host side of the [OpenPGP smart card
//! specifications][spec] v1.1 and v2.0: a driver that exposes the card's
//! data objects and private key operations to a PKCS#15-style consumer.
//!
//! [spec]: https://gnupg.org/ftp/specs/
//!
//! # Transports
//!
//! The driver contains no reader plumbing of its own.  It is generic over an
//! [`Iso7816`][`backend::Iso7816`] implementation that owns the connection
//! to the card, transmits APDUs and decodes status words, typically a thin
//! wrapper around a PC/SC card handle.
//!
//! # The virtual file system
//!
//! The OpenPGP card stores everything in a flat namespace of numbered data
//! objects, but PKCS#15 consumers expect a file hierarchy.  [`Card`]
//! synthesizes one: the well-known data objects appear as children of a fake
//! MF (`3F00`), and constructed data objects become directories whose
//! children are discovered lazily by parsing their BER-TLV contents.  The
//! virtual data objects `B601`, `B801` and `A401` expose the three on-card
//! public keys re-encoded as PKCS#1 DER.
//!
//! # Private key operations
//!
//! Signing, authentication and decryption are driven through a security
//! environment: [`Card::set_security_env`] validates the requested operation
//! against the selected key slot, and [`Card::compute_signature`] and
//! [`Card::decipher`] map it onto the matching card command (PSO: COMPUTE
//! DIGITAL SIGNATURE, INTERNAL AUTHENTICATE or PSO: DECIPHER).
//!
//! The driver is read-only by design: `write_binary` and `put_data` always
//! refuse.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    non_ascii_idents,
    trivial_casts,
    unused,
    unused_qualifications,
    clippy::expect_used,
    clippy::unwrap_used
)]
#![deny(unsafe_code)]

pub mod backend;

mod apdu;
mod atr;
mod blob;
mod card;
mod error;
mod pubkey;
mod tlv;
mod types;

pub use apdu::Apdu;
pub use card::{Card, AID};
pub use error::Error;
pub use types::{
    Algorithm, AlgorithmFlags, CardCtlRequest, CardCtlResponse, CardType, FileInfo, FileKind,
    FilePath, RsaAlgorithmInfo, SecurityEnvironment, SecurityOperation,
};
