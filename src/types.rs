// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

use bitflags::bitflags;

/// Card models recognized by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    /// OpenPGP card v1.0/1.1
    OpenPgpV1,
    /// CryptoStick v1.2 implementing OpenPGP card v2.0
    OpenPgpV2,
}

/// File types in the virtual hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Directory-like: a constructed data object (or the MF itself).
    Df,
    /// Elementary: a primitive data object.
    Ef,
}

/// Path argument for [`select_file`][`crate::Card::select_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePath {
    /// Select an application by its AID.
    Aid(Vec<u8>),
    /// Absolute path of 2-byte file identifiers, with or without a leading
    /// `3F00`.
    Absolute(Vec<u8>),
}

/// Snapshot of a selected file's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// File identifier (the DO tag).
    pub id: u16,
    /// Directory or elementary file.
    pub kind: FileKind,
    /// Absolute path from the MF.
    pub path: Vec<u8>,
    /// Size of the cached contents in bytes.
    pub size: usize,
}

/// Cryptographic operations a security environment can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityOperation {
    /// Digital signature computation.
    Sign,
    /// Decryption of a cryptogram.
    Decipher,
    /// Client/server authentication.
    Authenticate,
}

/// Algorithm selector for a security environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// RSA, the only algorithm the OpenPGP card v1.1/v2.0 driver supports.
    Rsa,
    /// Elliptic curve cryptography.
    Ec,
}

/// A security environment as set up by the PKCS#15 layer.
///
/// The driver requires a one-byte key reference selecting one of the three
/// key slots (0x00 signature, 0x01 decryption, 0x02 authentication) and
/// rejects file references, see § 7.2.18 of the card specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEnvironment {
    /// The operation to prepare.
    pub operation: SecurityOperation,
    /// Optional algorithm restriction; must be RSA if present.
    pub algorithm: Option<Algorithm>,
    /// Reference of the key to use.
    pub key_ref: Option<Vec<u8>>,
    /// File reference; not supported by this driver.
    pub file_ref: Option<Vec<u8>>,
}

bitflags! {
    /// Properties of the RSA implementation on the card.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AlgorithmFlags: u32 {
        /// Raw RSA operations.
        const RSA_RAW = 1 << 0;
        /// PKCS#1 v1.5 padding.
        const RSA_PAD_PKCS1 = 1 << 1;
        /// Hashing happens off-card.
        const RSA_HASH_NONE = 1 << 2;
    }
}

/// One RSA capability entry advertised by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsaAlgorithmInfo {
    /// Modulus length in bits.
    pub key_bits: usize,
    /// Supported padding and hashing modes.
    pub flags: AlgorithmFlags,
}

/// Generic control requests, the subset of the usual card-control family
/// that makes sense for this card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardCtlRequest {
    /// Read the cached card serial number.
    GetSerialNumber,
    /// Erase and reinitialize the card.
    EraseCard,
    /// Query the life cycle state.
    LifecycleGet,
    /// Change the life cycle state.
    LifecycleSet,
}

/// Responses to [`CardCtlRequest`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardCtlResponse {
    /// Manufacturer id and serial number from the application identifier.
    SerialNumber([u8; 6]),
}
