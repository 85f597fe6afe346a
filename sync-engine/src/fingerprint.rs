use common::document::Chunk;
use sha2::{Digest, Sha256};

/// Content fingerprint of a chunk: SHA-256 over the page content and the
/// canonical (key-sorted) metadata. The fingerprint doubles as the ledger key
/// and the vector-store record id. Because the pipeline tags the namespace
/// into metadata before reconciliation, keys never collide across namespaces.
pub fn chunk_key(chunk: &Chunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.page_content.as_bytes());
    hasher.update([0u8]);

    let mut keys: Vec<&String> = chunk.metadata.keys().collect();
    keys.sort();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        if let Some(value) = chunk.metadata.get(key) {
            hasher.update(value.to_string().as_bytes());
        }
        hasher.update([0u8]);
    }

    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
