use std::sync::Arc;

/// Offset from the start of an instruction to its operand area.
///
/// Byte 0 is the opcode, byte 1 the total encoded length (header
/// included), operands follow from byte 2. Code offsets carried in
/// operands (temp threads, abort paths) are relative to the operand area
/// of the instruction that carries them.
pub const INSTR_HEADER_LEN: usize = 2;

/// The execution context handed to an opcode handler for one dispatch.
///
/// Carries the identity of the running thread, its inherited context
/// values, and a cursor over the instruction's operand area. Handlers
/// decode their own operands positionally; the dispatcher owns the
/// program counter and applies the handler's outcome afterwards.
pub struct OpCall {
    pub program: Arc<[u8]>,
    /// Offset of the instruction's opcode byte within the program
    pub base: usize,
    pub op: u8,
    pub op_len: u8,
    /// Id of the thread executing this instruction
    pub thread_id: u32,
    /// Id of the thread that spawned the executing thread (0 = none)
    pub caller_thread_id: u32,
    /// Context values inherited from the spawning call
    pub ctx: [u32; 3],
    pos: usize,
}

impl OpCall {
    pub fn new(
        program: Arc<[u8]>,
        base: usize,
        thread_id: u32,
        caller_thread_id: u32,
        ctx: [u32; 3],
    ) -> Result<Self, String> {
        if base + INSTR_HEADER_LEN > program.len() {
            return Err(format!(
                "Instruction header at {:#x} runs past end of code ({} bytes)",
                base,
                program.len()
            ));
        }
        let op = program[base];
        let op_len = program[base + 1];
        Ok(OpCall {
            program,
            base,
            op,
            op_len,
            thread_id,
            caller_thread_id,
            ctx,
            pos: base + INSTR_HEADER_LEN,
        })
    }

    /// Absolute offset of the operand area (`base + 2`)
    pub fn operand_base(&self) -> usize {
        self.base + INSTR_HEADER_LEN
    }

    /// Resolve an operand-relative code offset to an absolute offset
    pub fn code_offset(&self, rel: i16) -> Result<usize, String> {
        let target = self.operand_base() as i64 + rel as i64;
        if target < 0 || target as usize >= self.program.len() {
            return Err(format!(
                "Code offset {} from {:#x} lands outside the program",
                rel,
                self.operand_base()
            ));
        }
        Ok(target as usize)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), String> {
        self.take(count)?;
        Ok(())
    }

    /// Read a signed 16-bit little-endian operand
    pub fn read_i16(&mut self) -> Result<i16, String> {
        let bytes = self.take(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read an unsigned 32-bit little-endian operand
    pub fn read_u32(&mut self) -> Result<u32, String> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a NUL-terminated string embedded in the code stream
    pub fn read_cstring(&mut self) -> Result<String, String> {
        let start = self.pos;
        let nul = self.program[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| {
                format!(
                    "Unterminated string operand at {:#x} (opcode {})",
                    start, self.op
                )
            })?;
        self.pos = start + nul + 1;
        Ok(String::from_utf8_lossy(&self.program[start..start + nul]).into_owned())
    }

    fn take(&mut self, count: usize) -> Result<&[u8], String> {
        if self.pos + count > self.program.len() {
            return Err(format!(
                "Operand read of {} bytes at {:#x} runs past end of code (opcode {})",
                count, self.pos, self.op
            ));
        }
        let slice = &self.program[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }
}
