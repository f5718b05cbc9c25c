// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

use hex_literal::hex;
use log::{debug, info, warn};

use crate::apdu;
use crate::atr;
use crate::backend::{Iso7816, PinKind, PinRequest, PinResponse};
use crate::blob::{self, Access, BlobId, FileTree, DO_REGISTRY, MF_ID};
use crate::error::Error;
use crate::pubkey;
use crate::tlv;
use crate::types::{
    Algorithm, AlgorithmFlags, CardCtlRequest, CardCtlResponse, CardType, FileInfo, FileKind,
    FilePath, RsaAlgorithmInfo, SecurityEnvironment, SecurityOperation,
};

/// Application identifier of the OpenPGP card application, § 4.2.1.
pub const AID: [u8; 6] = hex!("D2 76 00 01 24 01");

/// Fetch buffer sizes, depending on extended length support.
const EXTENDED_BUF_LEN: usize = 2048;
const SHORT_BUF_LEN: usize = 256;

/// Driver session for one OpenPGP card.
///
/// This is the main entry point of this crate.  A `Card` is bound to a single
/// [`Iso7816`] transport for its whole lifetime; constructing it selects the
/// OpenPGP application and builds the virtual file tree, dropping it (or
/// calling [`Card::finish`]) tears everything down.
#[derive(Debug)]
pub struct Card<T: Iso7816> {
    transport: T,
    card_type: CardType,
    name: &'static str,
    extended_apdu: bool,
    serial: Option<[u8; 6]>,
    algorithms: Vec<RsaAlgorithmInfo>,
    tree: FileTree,
    current: Option<BlobId>,
    sec_env: Option<SecurityEnvironment>,
}

impl<T: Iso7816> Card<T> {
    /// Checks whether the ATR belongs to a card this driver supports.
    pub fn match_card(atr: &[u8]) -> Option<CardType> {
        atr::match_atr(atr).map(|entry| entry.card_type)
    }

    /// Opens a driver session on the given transport.
    ///
    /// Recognizes the card from its ATR, registers the RSA capabilities,
    /// selects the OpenPGP application, populates the virtual file tree from
    /// the data object registry and probes the historical bytes for extended
    /// length support.
    pub fn new(transport: T) -> Result<Self, Error> {
        let entry = atr::match_atr(transport.atr()).ok_or_else(|| {
            info!("ATR does not belong to a supported OpenPGP card");
            Error::NotSupported
        })?;
        let extended_apdu = atr::supports_extended_apdu(transport.atr());
        debug!(
            "Matched {}, extended length support: {}",
            entry.name, extended_apdu
        );

        // Raw RSA with PKCS#1 padding and off-card hashing, card specs
        // § 2.1 and § 7.2.9/7.2.10
        let flags =
            AlgorithmFlags::RSA_RAW | AlgorithmFlags::RSA_PAD_PKCS1 | AlgorithmFlags::RSA_HASH_NONE;
        let mut key_sizes = vec![512, 768, 1024];
        if entry.card_type == CardType::OpenPgpV2 {
            key_sizes.push(2048);
        }
        let algorithms = key_sizes
            .into_iter()
            .map(|key_bits| RsaAlgorithmInfo { key_bits, flags })
            .collect();

        let mut card = Self {
            transport,
            card_type: entry.card_type,
            name: entry.name,
            extended_apdu,
            serial: None,
            algorithms,
            tree: FileTree::new(),
            current: None,
            sec_env: None,
        };

        let df_name = card.transport.select_aid(&AID)?;
        // The returned DF name is the full AID; manufacturer id and serial
        // number sit at offsets 8..14, § 4.2.1.
        if df_name.len() == 16 {
            let mut serial = [0; 6];
            serial.copy_from_slice(&df_name[8..14]);
            card.serial = Some(serial);
        } else {
            warn!("Unexpected DF name length {}, no serial", df_name.len());
        }

        let root = card.tree.root();
        for entry in DO_REGISTRY {
            let kind = if entry.constructed {
                FileKind::Df
            } else {
                FileKind::Ef
            };
            card.tree.new_blob(root, entry.tag, kind, Some(entry));
        }
        card.current = Some(root);

        Ok(card)
    }

    /// Ends the session and hands the transport back.
    pub fn finish(self) -> T {
        self.transport
    }

    /// The recognized card model.
    pub fn card_type(&self) -> CardType {
        self.card_type
    }

    /// Human-readable name of the recognized card model.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Manufacturer id and serial number extracted from the AID.
    pub fn serial_number(&self) -> Option<[u8; 6]> {
        self.serial
    }

    /// The RSA capabilities of this card.
    pub fn algorithms(&self) -> &[RsaAlgorithmInfo] {
        &self.algorithms
    }

    /// Handles a generic control request.
    pub fn card_ctl(&self, request: CardCtlRequest) -> Result<CardCtlResponse, Error> {
        match request {
            CardCtlRequest::GetSerialNumber => self
                .serial
                .map(CardCtlResponse::SerialNumber)
                .ok_or(Error::NotSupported),
            _ => Err(Error::NotSupported),
        }
    }

    fn buf_len(&self) -> usize {
        if self.extended_apdu {
            EXTENDED_BUF_LEN
        } else {
            SHORT_BUF_LEN
        }
    }

    /// Fetches the contents of a blob from the card if they are not cached
    /// yet.
    ///
    /// A failed fetch is recorded in the blob; for nodes without a registry
    /// descriptor the recorded error is replayed without touching the card.
    fn read_blob(&mut self, id: BlobId) -> Result<(), Error> {
        if self.tree.blob(id).data.is_some() {
            return Ok(());
        }
        let Some(entry) = self.tree.blob(id).info else {
            return match &self.tree.blob(id).status {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            };
        };

        match self.fetch_do(entry) {
            Ok(data) => {
                self.tree.blob_mut(id).set_data(data);
                Ok(())
            }
            Err(err) => {
                self.tree.blob_mut(id).status = Some(err.clone());
                Err(err)
            }
        }
    }

    fn fetch_do(&mut self, entry: &'static blob::DoInfo) -> Result<Vec<u8>, Error> {
        let buf_len = self.buf_len();
        match entry.access {
            Access::StandardData => self
                .transport
                .transmit_apdu(&apdu::get_data(entry.tag, buf_len, self.extended_apdu)),
            Access::PublicKey => self
                .transport
                .transmit_apdu(&apdu::read_public_key(entry.tag, buf_len, self.extended_apdu)),
            Access::EncodedPublicKey => self.encoded_public_key(entry.tag),
        }
    }

    /// Assembles the encoded public key behind one of the virtual B601,
    /// B801 and A401 data objects.
    ///
    /// Masking the low tag bit yields the real key DO; its 7F49 template
    /// holds the modulus (0081) and the public exponent (0082).
    fn encoded_public_key(&mut self, tag: u16) -> Result<Vec<u8>, Error> {
        let root = self.tree.root();
        let key = self.get_child_blob(root, tag & 0xFFFE)?;
        let template = self.get_child_blob(key, 0x7F49)?;
        let modulus = self.get_child_blob(template, 0x0081)?;
        let exponent = self.get_child_blob(template, 0x0082)?;
        self.read_blob(modulus)?;
        self.read_blob(exponent)?;

        let modulus = self.tree.blob(modulus).data.as_deref().unwrap_or(&[]);
        let exponent = self.tree.blob(exponent).data.as_deref().unwrap_or(&[]);
        let mut encoded = pubkey::encode_rsa_public_key(modulus, exponent)?;
        encoded.truncate(self.buf_len());
        Ok(encoded)
    }

    /// Discovers the children of a constructed blob by parsing its contents.
    ///
    /// Idempotent: once children exist, the card is not contacted again.
    fn enumerate_blob(&mut self, id: BlobId) -> Result<(), Error> {
        if !self.tree.blob(id).children.is_empty() {
            return Ok(());
        }
        self.read_blob(id)?;

        let Some(data) = self.tree.blob_mut(id).data.take() else {
            return Ok(());
        };
        let mut remainder = data.as_slice();
        let mut result = Ok(());
        while !remainder.is_empty() {
            match tlv::take_tlv(remainder) {
                Ok((child, rest)) => {
                    let kind = if child.constructed {
                        FileKind::Df
                    } else {
                        FileKind::Ef
                    };
                    let child_id = self.tree.new_blob(id, child.tag, kind, None);
                    self.tree.blob_mut(child_id).set_data(child.value.to_vec());
                    remainder = rest;
                }
                Err(err) => {
                    warn!(
                        "Unexpected end of contents in DO {:04x}",
                        self.tree.blob(id).tag
                    );
                    result = Err(err);
                    break;
                }
            }
        }
        self.tree.blob_mut(id).data = Some(data);
        result
    }

    /// Looks up a child by tag, enumerating the parent and fetching the
    /// child's contents on the way.
    fn get_child_blob(&mut self, parent: BlobId, tag: u16) -> Result<BlobId, Error> {
        self.enumerate_blob(parent)?;
        let Some(child) = self.tree.find_child(parent, tag) else {
            return Err(Error::FileNotFound);
        };
        // a fetch failure here is sticky and resurfaces on read_binary
        let _ = self.read_blob(child);
        Ok(child)
    }

    fn file_info(&self, id: BlobId) -> FileInfo {
        let blob = self.tree.blob(id);
        FileInfo {
            id: blob.tag,
            kind: blob.kind,
            path: blob.path.clone(),
            size: blob.len(),
        }
    }

    /// Selects a file in the virtual hierarchy (or an application by AID).
    ///
    /// On failure the current file becomes undefined and the next selection
    /// has to start over from the MF.
    pub fn select_file(&mut self, path: &FilePath) -> Result<FileInfo, Error> {
        match path {
            FilePath::Aid(aid) => {
                self.transport.select_aid(aid)?;
                let root = self.tree.root();
                self.current = Some(root);
                Ok(self.file_info(root))
            }
            FilePath::Absolute(path) => {
                if path.len() < 2 || path.len() % 2 != 0 {
                    return Err(Error::InvalidArguments);
                }
                let mut segments = path.as_slice();
                if segments.starts_with(&MF_ID.to_be_bytes()) {
                    segments = &segments[2..];
                }

                let mut id = self.tree.root();
                for segment in segments.chunks_exact(2) {
                    let tag = u16::from_be_bytes([segment[0], segment[1]]);
                    id = match self.get_child_blob(id, tag) {
                        Ok(child) => child,
                        Err(err) => {
                            self.current = None;
                            return Err(err);
                        }
                    };
                }
                self.current = Some(id);
                Ok(self.file_info(id))
            }
        }
    }

    /// Writes the 2-byte ids of the current DF's children into `buf`.
    ///
    /// Stops when the buffer is full and returns the number of bytes
    /// written.
    pub fn list_files(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let id = self.current.ok_or(Error::FileNotFound)?;
        if self.tree.blob(id).kind != FileKind::Df {
            return Err(Error::ObjectNotValid);
        }
        self.enumerate_blob(id)?;

        let mut written = 0;
        for &child in &self.tree.blob(id).children {
            if written + 2 > buf.len() {
                break;
            }
            buf[written..written + 2].copy_from_slice(&self.tree.blob(child).tag.to_be_bytes());
            written += 2;
        }
        Ok(written)
    }

    /// Reads from the currently selected elementary file.
    pub fn read_binary(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, Error> {
        let id = self.current.ok_or(Error::FileNotFound)?;
        if self.tree.blob(id).kind != FileKind::Ef {
            return Err(Error::FileNotFound);
        }
        self.read_blob(id)?;

        let blob = self.tree.blob(id);
        let data = blob.data.as_deref().unwrap_or(&[]);
        if offset > data.len() {
            return Err(Error::IncorrectParameters);
        }
        let count = buf.len().min(data.len() - offset);
        buf[..count].copy_from_slice(&data[offset..offset + count]);
        Ok(count)
    }

    /// The card's data objects cannot be modified through this driver.
    pub fn write_binary(&mut self, _offset: usize, _data: &[u8]) -> Result<usize, Error> {
        Err(Error::NotSupported)
    }

    /// Reads a data object into `buf` and returns the number of bytes
    /// copied.
    ///
    /// Tags with a registry entry are dispatched to their access method, so
    /// the virtual public key views work here as well; unknown tags are
    /// tried with a plain GET DATA.
    pub fn get_data(&mut self, tag: u16, buf: &mut [u8]) -> Result<usize, Error> {
        let data = match blob::find_do(tag).map(|entry| entry.access) {
            Some(Access::PublicKey) => self.transport.transmit_apdu(&apdu::read_public_key(
                tag,
                buf.len(),
                self.extended_apdu,
            ))?,
            Some(Access::EncodedPublicKey) => self.encoded_public_key(tag)?,
            Some(Access::StandardData) | None => self.transport.transmit_apdu(&apdu::get_data(
                tag,
                buf.len(),
                self.extended_apdu,
            ))?,
        };
        let count = data.len().min(buf.len());
        buf[..count].copy_from_slice(&data[..count]);
        Ok(count)
    }

    /// The card's data objects cannot be modified through this driver.
    pub fn put_data(&mut self, _tag: u16, _data: &[u8]) -> Result<usize, Error> {
        Err(Error::NotSupported)
    }

    /// Validates and stores a security environment for the following
    /// [`compute_signature`][`Self::compute_signature`] and
    /// [`decipher`][`Self::decipher`] calls.
    pub fn set_security_env(&mut self, env: &SecurityEnvironment) -> Result<(), Error> {
        if let Some(algorithm) = env.algorithm {
            if algorithm != Algorithm::Rsa {
                warn!("Only RSA is supported");
                return Err(Error::InvalidArguments);
            }
        }
        let Some(key_ref) = env.key_ref.as_deref() else {
            return Err(Error::InvalidArguments);
        };
        if key_ref.len() != 1 {
            return Err(Error::InvalidArguments);
        }
        if env.file_ref.is_some() {
            return Err(Error::InvalidArguments);
        }

        match env.operation {
            SecurityOperation::Sign => {
                if key_ref[0] != 0x00 && key_ref[0] != 0x02 {
                    warn!("Key reference not compatible with requested usage");
                    return Err(Error::InvalidArguments);
                }
            }
            SecurityOperation::Decipher => {
                if key_ref[0] != 0x01 {
                    warn!("Key reference not compatible with requested usage");
                    return Err(Error::InvalidArguments);
                }
            }
            _ => return Err(Error::InvalidArguments),
        }

        self.sec_env = Some(env.clone());
        Ok(())
    }

    /// Signs `data` with the key selected by the security environment.
    ///
    /// The signature key runs PSO: COMPUTE DIGITAL SIGNATURE, the
    /// authentication key INTERNAL AUTHENTICATE.  `data` is the hash or
    /// DigestInfo to sign; hashing happens off-card.
    pub fn compute_signature(&mut self, data: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let env = self.sec_env.as_ref().ok_or(Error::InvalidArguments)?;
        if env.operation != SecurityOperation::Sign {
            return Err(Error::InvalidArguments);
        }
        if !self.extended_apdu && data.len() > 255 {
            warn!("Signature input does not fit a short APDU");
            return Err(Error::InvalidArguments);
        }
        let key_ref = env.key_ref.as_deref().unwrap_or(&[]);
        let apdu = match key_ref.first().copied() {
            // signature key
            Some(0x00) => apdu::compute_signature(data, out.len(), self.extended_apdu),
            // authentication key
            Some(0x02) => apdu::internal_authenticate(data, out.len(), self.extended_apdu),
            Some(0x01) => {
                warn!("Invalid key reference (decipher only key)");
                return Err(Error::NotSupported);
            }
            _ => return Err(Error::InvalidArguments),
        };

        let response = self.transport.transmit_apdu(&apdu)?;
        let count = response.len().min(out.len());
        out[..count].copy_from_slice(&response[..count]);
        Ok(count)
    }

    /// Deciphers a cryptogram with the decryption key.
    pub fn decipher(&mut self, input: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let env = self.sec_env.as_ref().ok_or(Error::InvalidArguments)?;
        if env.operation != SecurityOperation::Decipher {
            return Err(Error::InvalidArguments);
        }
        // the padding indicator occupies one byte of the data field
        if !self.extended_apdu && input.len() > 254 {
            warn!("Cryptogram does not fit a short APDU");
            return Err(Error::InvalidArguments);
        }
        let key_ref = env.key_ref.as_deref().unwrap_or(&[]);
        let apdu = match key_ref.first().copied() {
            // decryption key
            Some(0x01) => apdu::decipher(input, out.len(), self.extended_apdu),
            Some(0x00) | Some(0x02) => {
                warn!("Invalid key reference (signature only key)");
                return Err(Error::InvalidArguments);
            }
            _ => return Err(Error::InvalidArguments),
        };

        let response = self.transport.transmit_apdu(&apdu)?;
        let count = response.len().min(out.len());
        out[..count].copy_from_slice(&response[..count]);
        Ok(count)
    }

    /// Runs a PIN command against the card.
    ///
    /// Only card holder verification PINs exist on this card; their
    /// references carry bit 0x80 on the wire (0x81, 0x82, 0x83).
    pub fn pin_cmd(&mut self, request: &PinRequest<'_>) -> Result<PinResponse, Error> {
        if request.kind != PinKind::Chv {
            return Err(Error::InvalidArguments);
        }
        let mut request = *request;
        request.reference |= 0x80;
        self.transport.pin_cmd(&request)
    }
}
