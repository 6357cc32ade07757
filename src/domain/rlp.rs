//! # RLP encoding and decoding
//!
//! Hand-rolled RLP (as in the Ethereum yellow paper) sized for exactly what
//! the node codec needs: encoding a branch/extension/leaf as a list of byte
//! strings, and decoding that same shape back. Not a general RLP library —
//! nested lists-of-lists never appear in a trie node's wire form.

use super::keys::NodeKey;
use super::TrieError;
use sha3::{Digest, Keccak256};

// =============================================================================
// ENCODING
// =============================================================================

/// RLP-encode a byte slice.
pub fn rlp_encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() < 56 {
        let mut result = vec![0x80 + data.len() as u8];
        result.extend_from_slice(data);
        result
    } else {
        let len_bytes = encode_length(data.len());
        let mut result = vec![0xb7 + len_bytes.len() as u8];
        result.extend_from_slice(&len_bytes);
        result.extend_from_slice(data);
        result
    }
}

/// RLP-encode a list of already-prepared items (each item is RLP-encoded
/// individually, then wrapped in a list header).
pub fn rlp_encode_list_items(items: &[Vec<u8>]) -> Vec<u8> {
    let encoded_items: Vec<Vec<u8>> = items.iter().map(|i| rlp_encode_bytes(i)).collect();
    let total_len: usize = encoded_items.iter().map(|e| e.len()).sum();

    let mut result = Vec::with_capacity(total_len + 9);
    if total_len < 56 {
        result.push(0xc0 + total_len as u8);
    } else {
        let len_bytes = encode_length(total_len);
        result.push(0xf7 + len_bytes.len() as u8);
        result.extend_from_slice(&len_bytes);
    }
    for encoded in encoded_items {
        result.extend(encoded);
    }
    result
}

/// Encode a length as minimal big-endian bytes.
fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}

/// Compute Keccak256 hash.
pub fn keccak256(data: &[u8]) -> NodeKey {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// =============================================================================
// DECODING
// =============================================================================

/// A decoded top-level RLP list: each element's raw payload bytes, in order.
///
/// Every node shape the codec emits (branch, extension, leaf) is a flat list
/// of byte strings, so this is the only decode result the core needs.
pub struct RlpList {
    pub items: Vec<Vec<u8>>,
}

/// Decode a single top-level RLP list into its raw item payloads.
///
/// Returns [`TrieError::GarbledNode`] for anything that is not a well-formed
/// RLP list of byte strings (truncated input, a nested list item, a length
/// prefix that overruns the buffer).
pub fn decode_list(data: &[u8]) -> Result<RlpList, TrieError> {
    if data.is_empty() {
        return Err(TrieError::GarbledNode);
    }
    let prefix = data[0];
    if prefix < 0xc0 {
        // Not a list at all.
        return Err(TrieError::GarbledNode);
    }

    let (payload, _consumed) = if prefix <= 0xf7 {
        let len = (prefix - 0xc0) as usize;
        (slice_checked(data, 1, len)?, 1 + len)
    } else {
        let len_of_len = (prefix - 0xf7) as usize;
        let len_bytes = slice_checked(data, 1, len_of_len)?;
        let len = be_bytes_to_usize(len_bytes)?;
        (slice_checked(data, 1 + len_of_len, len)?, 1 + len_of_len + len)
    };

    let mut items = Vec::new();
    let mut cursor = 0usize;
    while cursor < payload.len() {
        let (item, advance) = decode_one_string(&payload[cursor..])?;
        items.push(item);
        cursor += advance;
    }
    Ok(RlpList { items })
}

/// Decode one RLP-encoded byte string starting at the front of `data`,
/// returning `(payload, bytes_consumed)`. Errors if `data` starts with a
/// list header — this codec never nests lists inside node items.
fn decode_one_string(data: &[u8]) -> Result<(Vec<u8>, usize), TrieError> {
    if data.is_empty() {
        return Err(TrieError::GarbledNode);
    }
    let prefix = data[0];
    if prefix < 0x80 {
        Ok((vec![prefix], 1))
    } else if prefix <= 0xb7 {
        let len = (prefix - 0x80) as usize;
        Ok((slice_checked(data, 1, len)?.to_vec(), 1 + len))
    } else if prefix <= 0xbf {
        let len_of_len = (prefix - 0xb7) as usize;
        let len_bytes = slice_checked(data, 1, len_of_len)?;
        let len = be_bytes_to_usize(len_bytes)?;
        Ok((
            slice_checked(data, 1 + len_of_len, len)?.to_vec(),
            1 + len_of_len + len,
        ))
    } else {
        Err(TrieError::GarbledNode)
    }
}

fn slice_checked(data: &[u8], start: usize, len: usize) -> Result<&[u8], TrieError> {
    data.get(start..start + len).ok_or(TrieError::GarbledNode)
}

fn be_bytes_to_usize(bytes: &[u8]) -> Result<usize, TrieError> {
    if bytes.len() > std::mem::size_of::<usize>() {
        return Err(TrieError::GarbledNode);
    }
    let mut buf = [0u8; std::mem::size_of::<usize>()];
    buf[std::mem::size_of::<usize>() - bytes.len()..].copy_from_slice(bytes);
    Ok(usize::from_be_bytes(buf))
}
