//! # Certified State Tree
//!
//! The tree of path → value assertions a verified certificate vouches for,
//! and extraction of an update call's request status from it.
//!
//! Signature checking happens outside this crate (see
//! `CertificateVerifier`); this module only walks the verified tree.

use super::errors::AgentError;
use super::value_objects::{RejectCode, RequestId};

/// Certified hash tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashTree {
    /// No content.
    Empty,
    /// Two subtrees.
    Fork(Box<HashTree>, Box<HashTree>),
    /// Subtree under a label.
    Labeled(Vec<u8>, Box<HashTree>),
    /// Value.
    Leaf(Vec<u8>),
    /// Subtree removed from the certificate, only its digest remains.
    Pruned([u8; 32]),
}

/// Outcome of a path lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult<'a> {
    /// Leaf value at the path.
    Found(&'a [u8]),
    /// Provably absent.
    Absent,
    /// Possibly present in a pruned region.
    Unknown,
    /// Path ends on a non-leaf.
    Error,
}

enum LabelLookup<'a> {
    Found(&'a HashTree),
    Absent,
    Unknown,
}

impl HashTree {
    /// Leaf node.
    pub fn leaf(value: impl Into<Vec<u8>>) -> Self {
        Self::Leaf(value.into())
    }

    /// Labeled node.
    pub fn labeled(label: impl Into<Vec<u8>>, subtree: HashTree) -> Self {
        Self::Labeled(label.into(), Box::new(subtree))
    }

    /// Fork node.
    pub fn fork(left: HashTree, right: HashTree) -> Self {
        Self::Fork(Box::new(left), Box::new(right))
    }

    /// Lay out labeled children in label order under balanced forks.
    pub fn from_children(mut children: Vec<(Vec<u8>, HashTree)>) -> Self {
        children.sort_by(|a, b| a.0.cmp(&b.0));
        let mut nodes: Vec<HashTree> = children
            .into_iter()
            .map(|(label, tree)| HashTree::labeled(label, tree))
            .collect();

        if nodes.is_empty() {
            return HashTree::Empty;
        }
        while nodes.len() > 1 {
            let mut next = Vec::with_capacity(nodes.len().div_ceil(2));
            let mut iter = nodes.into_iter();
            while let Some(left) = iter.next() {
                match iter.next() {
                    Some(right) => next.push(HashTree::fork(left, right)),
                    None => next.push(left),
                }
            }
            nodes = next;
        }
        nodes.pop().unwrap_or(HashTree::Empty)
    }

    /// Look up a path of labels.
    pub fn lookup_path<P: AsRef<[u8]>>(&self, path: &[P]) -> LookupResult<'_> {
        match path.split_first() {
            None => match self {
                HashTree::Leaf(value) => LookupResult::Found(value),
                HashTree::Empty => LookupResult::Absent,
                HashTree::Pruned(_) => LookupResult::Unknown,
                HashTree::Fork(..) | HashTree::Labeled(..) => LookupResult::Error,
            },
            Some((label, rest)) => {
                let mut flat = Vec::new();
                flatten_forks(self, &mut flat);
                match find_label(label.as_ref(), &flat) {
                    LabelLookup::Found(subtree) => subtree.lookup_path(rest),
                    LabelLookup::Absent => LookupResult::Absent,
                    LabelLookup::Unknown => LookupResult::Unknown,
                }
            }
        }
    }
}

fn flatten_forks<'a>(tree: &'a HashTree, out: &mut Vec<&'a HashTree>) {
    match tree {
        HashTree::Empty => {}
        HashTree::Fork(left, right) => {
            flatten_forks(left, out);
            flatten_forks(right, out);
        }
        other => out.push(other),
    }
}

fn find_label<'a>(label: &[u8], nodes: &[&'a HashTree]) -> LabelLookup<'a> {
    for node in nodes.iter().copied() {
        if let HashTree::Labeled(l, subtree) = node {
            if l.as_slice() == label {
                return LabelLookup::Found(subtree.as_ref());
            }
        }
    }

    match nodes {
        [] | [HashTree::Leaf(_)] => return LabelLookup::Absent,
        _ => {}
    }

    // Labels are sorted; absence is provable only next to unpruned neighbours.
    if let Some(HashTree::Labeled(first, _)) = nodes.first() {
        if label < first.as_slice() {
            return LabelLookup::Absent;
        }
    }
    if let Some(HashTree::Labeled(last, _)) = nodes.last() {
        if last.as_slice() < label {
            return LabelLookup::Absent;
        }
    }
    for pair in nodes.windows(2) {
        if let (HashTree::Labeled(l1, _), HashTree::Labeled(l2, _)) = (pair[0], pair[1]) {
            if l1.as_slice() < label && label < l2.as_slice() {
                return LabelLookup::Absent;
            }
        }
    }
    LabelLookup::Unknown
}

/// Reject fields read from a certificate or a query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Reject code.
    pub reject_code: RejectCode,
    /// Human-readable message.
    pub reject_message: String,
    /// Optional machine error code.
    pub error_code: Option<String>,
}

/// Status of an update call at one inspection of its certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// No status recorded yet.
    Unknown,
    /// Received by the platform.
    Received,
    /// Being executed.
    Processing,
    /// Completed with reply bytes.
    Replied(Vec<u8>),
    /// Rejected.
    Rejected(Rejection),
    /// Completed, reply already pruned.
    Done,
}

impl RequestStatus {
    /// Whether polling can stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Replied(_) | Self::Rejected(_) | Self::Done)
    }
}

/// Read the status of `request_id` at `["request_status", id, ...]`.
pub fn lookup_request_status(
    tree: &HashTree,
    request_id: &RequestId,
) -> Result<RequestStatus, AgentError> {
    let base: [&[u8]; 2] = [b"request_status", request_id.as_bytes()];
    let lookup = |field: &str| {
        let path: [&[u8]; 3] = [base[0], base[1], field.as_bytes()];
        tree.lookup_path(&path)
    };

    let status = match lookup("status") {
        LookupResult::Found(bytes) => utf8(bytes, "status")?,
        LookupResult::Absent | LookupResult::Unknown => return Ok(RequestStatus::Unknown),
        LookupResult::Error => {
            return Err(AgentError::transient("certificate status path is not a leaf"))
        }
    };

    match status.as_str() {
        "received" => Ok(RequestStatus::Received),
        "processing" => Ok(RequestStatus::Processing),
        "done" => Ok(RequestStatus::Done),
        "replied" => match lookup("reply") {
            LookupResult::Found(reply) => Ok(RequestStatus::Replied(reply.to_vec())),
            _ => Err(AgentError::transient(
                "certificate reports replied without a reply",
            )),
        },
        "rejected" => {
            let reject_code = match lookup("reject_code") {
                LookupResult::Found(bytes) => read_leb128(bytes).ok_or_else(|| {
                    AgentError::transient("malformed reject_code in certificate")
                })?,
                _ => return Err(AgentError::transient("certificate missing reject_code")),
            };
            let reject_message = match lookup("reject_message") {
                LookupResult::Found(bytes) => utf8(bytes, "reject_message")?,
                _ => {
                    return Err(AgentError::transient(
                        "certificate missing reject_message",
                    ))
                }
            };
            let error_code = match lookup("error_code") {
                LookupResult::Found(bytes) => Some(utf8(bytes, "error_code")?),
                _ => None,
            };
            Ok(RequestStatus::Rejected(Rejection {
                reject_code: RejectCode::from_code(reject_code),
                reject_message,
                error_code,
            }))
        }
        other => Err(AgentError::transient(format!(
            "unknown request status in certificate: {other}"
        ))),
    }
}

fn utf8(bytes: &[u8], field: &str) -> Result<String, AgentError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| AgentError::transient(format!("certificate field {field} is not UTF-8")))
}

/// Decode an unsigned LEB128 number.
pub fn read_leb128(bytes: &[u8]) -> Option<u64> {
    let mut result: u64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift >= 64 {
            return None;
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
    }
    None
}

/// Encode an unsigned LEB128 number.
pub fn write_leb128(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}
