use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

/// Block counters saturate here; increments past it are silently dropped
pub const BLOCK_COUNTER_MAX: u8 = 63;

/// Number of property bits addressable through the low 16 bits of an id
const PROPERTY_COUNT: usize = 0x1_0000;

/// Persistent small-integer counters used for story-progress gating.
///
/// Counters are addressed by a 16-bit index and clamped to
/// `0..=BLOCK_COUNTER_MAX`. They survive scene changes and are part of the
/// saved-game state, so the struct is (de)serializable; the core itself
/// never touches disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCounters {
    counters: Vec<u8>,
}

impl BlockCounters {
    pub fn new() -> Self {
        BlockCounters {
            counters: Vec::new(),
        }
    }

    /// Read a counter; unset indices read as zero
    pub fn get(&self, index: i16) -> u8 {
        let index = index as u16 as usize;
        self.counters.get(index).copied().unwrap_or(0)
    }

    /// Write a counter, growing the store on first touch
    pub fn set(&mut self, index: i16, value: u8) {
        let index = index as u16 as usize;
        if index >= self.counters.len() {
            self.counters.resize(index + 1, 0);
        }
        self.counters[index] = value.min(BLOCK_COUNTER_MAX);
    }

    pub fn clear(&mut self, index: i16) {
        self.set(index, 0);
    }

    pub fn clear_all(&mut self) {
        self.counters.clear();
    }
}

impl Default for BlockCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistent boolean flags addressed by a 32-bit id.
///
/// Only the low 16 bits of the id select a bit; the high half is the
/// resource-type tag the scripts carry around. Same persistence story as
/// [`BlockCounters`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Properties {
    bits: BitVec,
}

impl Properties {
    pub fn new() -> Self {
        let mut bits = BitVec::new();
        bits.resize(PROPERTY_COUNT, false);
        Properties { bits }
    }

    pub fn get(&self, property_id: u32) -> bool {
        let index = (property_id & 0xFFFF) as usize;
        self.bits.get(index).map(|b| *b).unwrap_or(false)
    }

    pub fn set(&mut self, property_id: u32, value: bool) {
        let index = (property_id & 0xFFFF) as usize;
        self.bits.set(index, value);
    }

    pub fn clear_all(&mut self) {
        self.bits.fill(false);
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self::new()
    }
}

/// Relational compare used by the counter-compare opcode.
///
/// Operator codes 1..=6 select eq/ne/lt/gt/ge/le over signed values; any
/// other code compares to `false`. The default case is documented script
/// behavior, not an error.
pub fn compare(lvalue: i16, compare_op: i16, rvalue: i16) -> bool {
    match compare_op {
        1 => lvalue == rvalue,
        2 => lvalue != rvalue,
        3 => lvalue < rvalue,
        4 => lvalue > rvalue,
        5 => lvalue >= rvalue,
        6 => lvalue <= rvalue,
        _ => false,
    }
}
