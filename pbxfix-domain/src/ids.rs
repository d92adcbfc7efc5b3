//! Identifier allocation.
//!
//! New identifiers are derived from a stable seed, so the same document and manifest always
//! produce the same output, and are checked against every identifier already in use.

use pbxfix_edit::Document;
use pbxfix_types::ObjectId;
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

const NAMESPACE: Uuid = Uuid::from_bytes([
    0x7c, 0x1e, 0x94, 0x02, 0x3b, 0x6f, 0x4a, 0xd5, 0x9b, 0x20, 0x5e, 0x0c, 0x81, 0x47, 0xe6,
    0x3a,
]);

/// Identifiers are 24 hex digits, the width Xcode uses.
const ID_BYTES: usize = 12;

#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    used: BTreeSet<String>,
}

impl IdAllocator {
    pub fn new(used: BTreeSet<String>) -> Self {
        Self { used }
    }

    /// Reserve everything the document defines or mentions.
    pub fn from_document(doc: &Document) -> Self {
        Self::new(doc.identifiers_in_use())
    }

    pub fn is_used(&self, id: &str) -> bool {
        self.used.contains(id)
    }

    /// A fresh identifier for `seed`; re-derived with the next counter value on collision.
    pub fn allocate(&mut self, seed: &str) -> ObjectId {
        let mut counter: u64 = 0;
        loop {
            let id = derive(seed, counter);
            if self.used.insert(id.to_string()) {
                if counter > 0 {
                    debug!(seed, counter, id = %id, "identifier collision resolved");
                }
                return id;
            }
            counter += 1;
        }
    }
}

fn derive(seed: &str, counter: u64) -> ObjectId {
    let key = format!("{seed}|{counter}");
    let uuid = Uuid::new_v5(&NAMESPACE, key.as_bytes());
    ObjectId::from_bytes(&uuid.as_bytes()[..ID_BYTES])
}
