//! Transaction commitment for block headers.
//!
//! Binary BLAKE3 tree with domain separation between leaves (`0x00`) and
//! inner nodes (`0x01`). A layer of odd width pairs its last entry with
//! itself. The root of an empty list is [`Hash256::ZERO`].

use crate::types::Hash256;

const LEAF_TAG: u8 = 0x00;
const INNER_TAG: u8 = 0x01;

fn tagged(tag: u8, parts: &[&Hash256]) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[tag]);
    for part in parts {
        hasher.update(part.as_bytes());
    }
    Hash256(hasher.finalize().into())
}

/// Root over `leaves` in the given order.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    let mut layer: Vec<Hash256> = leaves.iter().map(|leaf| tagged(LEAF_TAG, &[leaf])).collect();
    if layer.is_empty() {
        return Hash256::ZERO;
    }
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                tagged(INNER_TAG, &[left, right])
            })
            .collect();
    }
    layer[0]
}
