//! Remote content tree nodes.
//!
//! Every response in the content library has the same loose JSON shape:
//!
//! ```json
//! {
//!   "folders":   [ { "links": [ { "rel": "listContentLibraryFolders", "href": "..." } ] } ],
//!   "documents": [ { "links": [ { "rel": "getDocumentContent", "href": "..." } ] } ],
//!   "items":     [ { "links": [ { "rel": "getContentLibraryItem", "href": "..." } ] } ],
//!   "documentPath": "/contentlibrary/a/page.htm", "content": "<html>...",
//!   "itemPath": "/contentlibrary/a/logo.png", "itemData": "iVBORw0KGgo...",
//!   "links": [ ... ]
//! }
//! ```
//!
//! All keys are optional. [`RemoteNode::parse`] decides the node kind once:
//! a document when `documentPath` and `content` are both present, otherwise an
//! item when `itemPath` and `itemData` are, otherwise a folder. Whatever the
//! kind, the links found in the three listing arrays under their traversal
//! relation become the node's children.
//!
//! `itemData` may arrive line-wrapped and with or without `=` padding.

use crate::error::{Result, SyncError};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;

/// Relation of a folder entry link that lists its sub-folders and files.
pub const REL_LIST_FOLDERS: &str = "listContentLibraryFolders";
/// Relation of a document entry link that fetches the document content.
pub const REL_DOCUMENT_CONTENT: &str = "getDocumentContent";
/// Relation of an item entry link that fetches the item data.
pub const REL_ITEM_CONTENT: &str = "getContentLibraryItem";

/// Standard alphabet, padding optional.
const ITEM_DATA: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    links: Option<Vec<Link>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    #[serde(default)]
    folders: Option<Vec<RawEntry>>,
    #[serde(default)]
    documents: Option<Vec<RawEntry>>,
    #[serde(default)]
    items: Option<Vec<RawEntry>>,
    document_path: Option<String>,
    content: Option<String>,
    item_path: Option<String>,
    item_data: Option<String>,
}

/// Which kind of payload a node carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Document,
    Item,
}

/// A file to mirror: remote path plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub kind: PayloadKind,
    pub path: String,
    pub data: Bytes,
}

/// One parsed response from the content library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteNode {
    Folder {
        children: Vec<Link>,
    },
    Document {
        document_path: String,
        content: String,
        children: Vec<Link>,
    },
    Item {
        item_path: String,
        /// Decoded from the base64 `itemData` field.
        item_data: Bytes,
        children: Vec<Link>,
    },
}

impl RemoteNode {
    /// Parse a response body fetched from `href`.
    pub fn parse(href: &str, body: &[u8]) -> Result<Self> {
        let malformed = |reason: String| SyncError::MalformedResponse {
            href: href.to_string(),
            reason,
        };

        let raw: RawNode = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;

        let mut children = Vec::new();
        collect_children(&mut children, raw.folders, REL_LIST_FOLDERS);
        collect_children(&mut children, raw.documents, REL_DOCUMENT_CONTENT);
        collect_children(&mut children, raw.items, REL_ITEM_CONTENT);

        let node = match (raw.document_path, raw.content, raw.item_path, raw.item_data) {
            (Some(document_path), Some(content), _, _) => RemoteNode::Document {
                document_path,
                content,
                children,
            },
            (_, _, Some(item_path), Some(item_data)) => {
                let decoded = decode_item_data(&item_data)
                    .map_err(|e| malformed(format!("itemData is not valid base64: {}", e)))?;

                RemoteNode::Item {
                    item_path,
                    item_data: Bytes::from(decoded),
                    children,
                }
            }
            _ => RemoteNode::Folder { children },
        };

        Ok(node)
    }

    /// Traversal edges discovered in this node's listing arrays.
    pub fn children(&self) -> &[Link] {
        match self {
            RemoteNode::Folder { children, .. }
            | RemoteNode::Document { children, .. }
            | RemoteNode::Item { children, .. } => children,
        }
    }

    /// The file this node asks to be written, if any.
    pub fn payload(&self) -> Option<Payload> {
        match self {
            RemoteNode::Folder { .. } => None,
            RemoteNode::Document {
                document_path,
                content,
                ..
            } => Some(Payload {
                kind: PayloadKind::Document,
                path: document_path.clone(),
                data: Bytes::from(content.clone()),
            }),
            RemoteNode::Item {
                item_path,
                item_data,
                ..
            } => Some(Payload {
                kind: PayloadKind::Item,
                path: item_path.clone(),
                data: item_data.clone(),
            }),
        }
    }
}

fn decode_item_data(encoded: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    ITEM_DATA.decode(compact)
}

fn collect_children(out: &mut Vec<Link>, entries: Option<Vec<RawEntry>>, rel: &str) {
    for entry in entries.into_iter().flatten() {
        out.extend(
            entry
                .links
                .into_iter()
                .flatten()
                .filter(|link| link.rel == rel),
        );
    }
}
