// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Platform seam between the driver and the low-level ISO 7816-4 transport.
//!
//! The driver is generic over an [`Iso7816`] implementation that owns the
//! reader connection: it transmits APDUs, decodes SW1/SW2 status words and
//! performs the generic SELECT and PIN commands.  Implementations typically
//! wrap a PC/SC card handle; the test suite uses an in-memory card.

use crate::apdu::Apdu;
use crate::error::Error;

/// PIN classes of ISO 7816-4 access conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    /// Card holder verification.
    Chv,
    /// External authentication key.
    Aut,
    /// Secure messaging key.
    Pro,
}

/// What to do with the referenced PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOperation {
    /// VERIFY
    Verify,
    /// CHANGE REFERENCE DATA
    Change,
    /// RESET RETRY COUNTER
    Unblock,
}

/// A PIN command to run against the card.
#[derive(Debug, Clone, Copy)]
pub struct PinRequest<'a> {
    /// PIN class; the OpenPGP driver only accepts [`PinKind::Chv`].
    pub kind: PinKind,
    /// Verify, change or unblock.
    pub operation: PinOperation,
    /// PIN reference as sent to the card.
    pub reference: u8,
    /// The PIN itself.
    pub pin: &'a [u8],
    /// Replacement PIN for [`PinOperation::Change`] and
    /// [`PinOperation::Unblock`].
    pub new_pin: Option<&'a [u8]>,
}

/// Outcome of a successful PIN command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinResponse {
    /// Verification attempts left, if the card reported them.
    pub tries_left: Option<u8>,
}

/// The ISO 7816-4 operations the driver consumes.
///
/// `transmit_apdu` returns the response payload with the trailing status
/// words already decoded: a non-success status surfaces as
/// [`Error::Card`], transport failures as [`Error::Transport`].
pub trait Iso7816 {
    /// Answer-to-reset of the connected card.
    fn atr(&self) -> &[u8];

    /// Transmits a command APDU and returns the response payload.
    fn transmit_apdu(&mut self, apdu: &Apdu) -> Result<Vec<u8>, Error>;

    /// SELECT by DF name; returns the DF name reported in the FCI.
    fn select_aid(&mut self, aid: &[u8]) -> Result<Vec<u8>, Error>;

    /// Runs a PIN command against the card.
    fn pin_cmd(&mut self, request: &PinRequest<'_>) -> Result<PinResponse, Error>;
}
