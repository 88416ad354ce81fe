//! Small assembler for script code blobs.
//!
//! Instructions are framed as opcode byte, total-length byte, then
//! operands; the builder backpatches the length byte so callers only
//! write the operands. Used by tests and the demo runner; an engine with
//! real script resources never needs it.

/// Operand sink handed to the closure passed to [`ScriptBuilder::instr`].
pub struct InstrArgs {
    bytes: Vec<u8>,
}

impl InstrArgs {
    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// The two padding bytes that keep 32-bit operands aligned
    pub fn skip2(&mut self) -> &mut Self {
        self.bytes.extend_from_slice(&[0, 0]);
        self
    }

    pub fn cstr(&mut self, text: &str) -> &mut Self {
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        self
    }
}

pub struct ScriptBuilder {
    code: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        ScriptBuilder { code: Vec::new() }
    }

    /// Current offset, i.e. where the next instruction starts
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Emit one instruction; the closure writes its operands
    pub fn instr(&mut self, opcode: u8, f: impl FnOnce(&mut InstrArgs)) -> &mut Self {
        let mut args = InstrArgs { bytes: Vec::new() };
        f(&mut args);
        let len = 2 + args.bytes.len();
        assert!(len <= u8::MAX as usize, "instruction too long");
        self.code.push(opcode);
        self.code.push(len as u8);
        self.code.extend_from_slice(&args.bytes);
        self
    }

    // Shorthand for the zero-operand control opcodes tests use constantly.

    pub fn suspend(&mut self) -> &mut Self {
        self.instr(2, |_| {})
    }

    pub fn yield_turn(&mut self) -> &mut Self {
        self.instr(3, |_| {})
    }

    pub fn terminate(&mut self) -> &mut Self {
        self.instr(4, |_| {})
    }

    pub fn jump(&mut self, offset: i16) -> &mut Self {
        self.instr(5, |a| {
            a.i16(offset);
        })
    }

    pub fn build(&self) -> Vec<u8> {
        self.code.clone()
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing() {
        let mut sb = ScriptBuilder::new();
        sb.instr(79, |a| {
            a.skip2().i16(3).i16(4);
        });
        sb.terminate();
        let code = sb.build();
        // ifLte: opcode, len 8, two pad bytes, 3, 4; then terminate
        assert_eq!(code[0], 79);
        assert_eq!(code[1], 8);
        assert_eq!(&code[4..6], &3i16.to_le_bytes());
        assert_eq!(code[8], 4);
        assert_eq!(code[9], 2);
    }

    #[test]
    fn test_here_tracks_offsets() {
        let mut sb = ScriptBuilder::new();
        assert_eq!(sb.here(), 0);
        sb.jump(0);
        assert_eq!(sb.here(), 4);
    }
}
