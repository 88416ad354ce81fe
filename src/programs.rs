use std::collections::HashMap;
use std::sync::Arc;

/// Script code blobs keyed by code id.
///
/// The embedding engine registers a blob per script resource; named
/// threads start at offset 0 of their blob, temp threads reuse the
/// spawning thread's blob at a computed offset. Blobs are shared
/// read-only between threads.
pub struct ProgramStore {
    blobs: HashMap<u32, Arc<[u8]>>,
}

impl ProgramStore {
    pub fn new() -> Self {
        ProgramStore {
            blobs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, code_id: u32, code: Vec<u8>) {
        self.blobs.insert(code_id, Arc::from(code.into_boxed_slice()));
    }

    pub fn code(&self, code_id: u32) -> Result<Arc<[u8]>, String> {
        self.blobs
            .get(&code_id)
            .cloned()
            .ok_or_else(|| format!("No script code registered for id {:08X}", code_id))
    }

    pub fn contains(&self, code_id: u32) -> bool {
        self.blobs.contains_key(&code_id)
    }
}

impl Default for ProgramStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mut store = ProgramStore::new();
        store.insert(0x0002_0001, vec![4, 2]);
        assert!(store.contains(0x0002_0001));
        assert_eq!(&store.code(0x0002_0001).unwrap()[..], &[4, 2]);
        assert!(store.code(0x0002_0002).is_err());
    }
}
