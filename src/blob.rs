// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! The virtual file hierarchy over the card's flat data object namespace.
//!
//! The OpenPGP card has no file system; everything lives in numbered data
//! objects accessed through GET DATA.  The PKCS#15 layer on top expects to
//! walk a file tree, so the driver synthesizes one: the data objects from the
//! static registry become children of a fake MF, and constructed data objects
//! turn into directories whose children are discovered by parsing their
//! BER-TLV contents on first use.

use crate::error::Error;
use crate::types::FileKind;

/// File identifier of the fake master file.
pub(crate) const MF_ID: u16 = 0x3F00;

/// How the contents of a data object are obtained from the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Plain GET DATA.
    StandardData,
    /// Read variant of GENERATE ASYMMETRIC KEY PAIR.
    PublicKey,
    /// Not on the card: assembled from the modulus and public exponent of
    /// the underlying key DO.
    EncodedPublicKey,
}

/// Registry entry for a data object known to the driver.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DoInfo {
    pub tag: u16,
    pub constructed: bool,
    pub access: Access,
}

const fn simple(tag: u16) -> DoInfo {
    DoInfo {
        tag,
        constructed: false,
        access: Access::StandardData,
    }
}

const fn constructed(tag: u16) -> DoInfo {
    DoInfo {
        tag,
        constructed: true,
        access: Access::StandardData,
    }
}

const fn public_key(tag: u16) -> DoInfo {
    DoInfo {
        tag,
        constructed: true,
        access: Access::PublicKey,
    }
}

const fn encoded_public_key(tag: u16) -> DoInfo {
    DoInfo {
        tag,
        constructed: false,
        access: Access::EncodedPublicKey,
    }
}

/// The data objects exposed under the MF, card specs § 4.4.1.
///
/// The B601/B801/A401 entries are virtual: they hold the public keys of the
/// three key slots re-encoded for PKCS#15 consumption.
pub(crate) static DO_REGISTRY: &[DoInfo] = &[
    simple(0x004F),
    simple(0x005E),
    constructed(0x0065),
    constructed(0x006E),
    constructed(0x007A),
    simple(0x00C4),
    simple(0x0101),
    simple(0x0102),
    simple(0x5F50),
    simple(0x5F52),
    constructed(0x7F21),
    public_key(0xB600),
    public_key(0xB800),
    public_key(0xA400),
    encoded_public_key(0xB601),
    encoded_public_key(0xB801),
    encoded_public_key(0xA401),
];

pub(crate) fn find_do(tag: u16) -> Option<&'static DoInfo> {
    DO_REGISTRY.iter().find(|info| info.tag == tag)
}

/// Handle of a blob within its [`FileTree`].
pub(crate) type BlobId = usize;

/// One node of the virtual file tree.
#[derive(Debug)]
pub(crate) struct Blob {
    pub tag: u16,
    pub kind: FileKind,
    /// Non-owning link for upward navigation.
    #[allow(unused)]
    pub parent: Option<BlobId>,
    /// Children in discovery order.
    pub children: Vec<BlobId>,
    pub info: Option<&'static DoInfo>,
    /// Contents of the DO, present iff it has been fetched.
    pub data: Option<Vec<u8>>,
    /// Error of the last failed fetch, cleared by a successful one.
    pub status: Option<Error>,
    /// Absolute path from the MF.
    pub path: Vec<u8>,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Installs freshly fetched contents, releasing the previous buffer.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.status = None;
        self.data = Some(data);
    }
}

/// Arena holding the blob tree; dropping it tears down every node.
#[derive(Debug)]
pub(crate) struct FileTree {
    nodes: Vec<Blob>,
}

impl FileTree {
    /// Creates a tree containing only the MF.
    pub fn new() -> Self {
        Self {
            nodes: vec![Blob {
                tag: MF_ID,
                kind: FileKind::Df,
                parent: None,
                children: Vec::new(),
                info: None,
                data: None,
                status: None,
                path: MF_ID.to_be_bytes().to_vec(),
            }],
        }
    }

    pub fn root(&self) -> BlobId {
        0
    }

    pub fn blob(&self, id: BlobId) -> &Blob {
        &self.nodes[id]
    }

    pub fn blob_mut(&mut self, id: BlobId) -> &mut Blob {
        &mut self.nodes[id]
    }

    /// Appends a new blob to `parent`'s child list.
    pub fn new_blob(
        &mut self,
        parent: BlobId,
        tag: u16,
        kind: FileKind,
        info: Option<&'static DoInfo>,
    ) -> BlobId {
        let mut path = self.nodes[parent].path.clone();
        path.extend_from_slice(&tag.to_be_bytes());
        let id = self.nodes.len();
        self.nodes.push(Blob {
            tag,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            info,
            data: None,
            status: None,
            path,
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn find_child(&self, parent: BlobId, tag: u16) -> Option<BlobId> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].tag == tag)
    }
}
