// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

use iso7816::Status;

/// Errors reported by the driver or passed through from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The transport failed to allocate a buffer.
    OutOfMemory,
    /// An argument did not pass validation.
    InvalidArguments,
    /// The requested operation is not available on this card.
    NotSupported,
    /// Path traversal could not locate the requested file.
    FileNotFound,
    /// A data object could not be parsed as BER-TLV.
    ObjectNotValid,
    /// A read offset pointed beyond the end of the file.
    IncorrectParameters,
    /// The card answered with an error status word.
    Card(Status),
    /// The reader or the transport layer failed.
    Transport(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::OutOfMemory => f.write_str("Out of memory"),
            Error::InvalidArguments => f.write_str("Invalid arguments"),
            Error::NotSupported => f.write_str("Operation not supported"),
            Error::FileNotFound => f.write_str("File not found"),
            Error::ObjectNotValid => f.write_str("Data object contents are not valid"),
            Error::IncorrectParameters => f.write_str("Incorrect parameters"),
            Error::Card(status) => write!(f, "Card returned error status {status:?}"),
            Error::Transport(msg) => write!(f, "Transport failure: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
