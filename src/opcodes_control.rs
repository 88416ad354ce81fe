//! Control-flow, stack, logic and state-flag opcodes.
//!
//! Handlers decode their operands positionally from the call context and
//! report what should happen next through [`Outcome`]; the dispatcher
//! owns the program counter. Boolean results are pushed as 0/1.

use crate::instruction::OpCall;
use crate::interpreter::Interpreter;
use crate::opcode_tables::{opcode_name, Opcode};
use crate::thread::{Outcome, NOTIFY_SUPPRESS};
use crate::values::{compare, BLOCK_COUNTER_MAX};
use log::debug;

pub fn is_control_op(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Suspend
            | Opcode::Yield
            | Opcode::Terminate
            | Opcode::Jump
            | Opcode::JumpIf
            | Opcode::IfLte
            | Opcode::Not
            | Opcode::And
            | Opcode::Or
            | Opcode::StackPop
            | Opcode::StackDup
            | Opcode::StackPush0
            | Opcode::StackPushRandom
            | Opcode::DebugPrint
            | Opcode::IncBlockCounter
            | Opcode::ClearBlockCounter
            | Opcode::CompareBlockCounter
            | Opcode::SetProperty
            | Opcode::GetProperty
            | Opcode::AddMenuChoice
            | Opcode::SwitchMenuChoice
            | Opcode::NotifyCaller
    )
}

impl Interpreter {
    pub fn execute_control_op(
        &mut self,
        opcode: Opcode,
        call: &mut OpCall,
    ) -> Result<Outcome, String> {
        match opcode {
            Opcode::Suspend => Ok(Outcome::Suspend),

            Opcode::Yield => Ok(Outcome::Yield),

            Opcode::Terminate => Ok(Outcome::Terminate),

            Opcode::Jump => {
                let jump_offs = call.read_i16()?;
                Ok(Outcome::Jump(jump_offs as i32))
            }

            // Branch when the popped value is zero
            Opcode::JumpIf => {
                let jump_offs = call.read_i16()?;
                let value = self.stack.pop()?;
                if value == 0 {
                    Ok(Outcome::Jump(jump_offs as i32))
                } else {
                    Ok(Outcome::Continue)
                }
            }

            // Take the else branch when the popped value is NOT <= rvalue
            Opcode::IfLte => {
                call.skip(2)?;
                let rvalue = call.read_i16()?;
                let else_jump_offs = call.read_i16()?;
                let lvalue = self.stack.pop()?;
                if !(lvalue <= rvalue) {
                    Ok(Outcome::Jump(else_jump_offs as i32))
                } else {
                    Ok(Outcome::Continue)
                }
            }

            Opcode::Not => {
                let value = self.stack.pop()?;
                self.stack.push(if value != 0 { 0 } else { 1 })?;
                Ok(Outcome::Continue)
            }

            Opcode::And => {
                let value1 = self.stack.pop()?;
                let value2 = self.stack.pop()?;
                self.stack.push(value1 & value2)?;
                Ok(Outcome::Continue)
            }

            Opcode::Or => {
                let value1 = self.stack.pop()?;
                let value2 = self.stack.pop()?;
                self.stack.push(value1 | value2)?;
                Ok(Outcome::Continue)
            }

            Opcode::StackPop => {
                self.stack.pop()?;
                Ok(Outcome::Continue)
            }

            Opcode::StackDup => {
                let value = self.stack.peek()?;
                self.stack.push(value)?;
                Ok(Outcome::Continue)
            }

            Opcode::StackPush0 => {
                self.stack.push(0)?;
                Ok(Outcome::Continue)
            }

            // Pushes a value in [1, max]; the +1 happens here, not in the
            // random source
            Opcode::StackPushRandom => {
                let max_value = call.read_i16()?;
                let span = if max_value > 0 { max_value as u32 - 1 } else { 0 };
                self.stack.push(self.rng.bounded(span) as i16 + 1)?;
                Ok(Outcome::Continue)
            }

            Opcode::DebugPrint => {
                let text = call.read_cstring()?;
                debug!("[DBG] {}", text);
                Ok(Outcome::Continue)
            }

            // Increments past the cap are dropped; the counter freezes
            Opcode::IncBlockCounter => {
                let index = call.read_i16()?;
                let value = self.counters.get(index) + 1;
                if value <= BLOCK_COUNTER_MAX {
                    self.counters.set(index, value);
                }
                Ok(Outcome::Continue)
            }

            Opcode::ClearBlockCounter => {
                let index = call.read_i16()?;
                self.counters.clear(index);
                Ok(Outcome::Continue)
            }

            Opcode::CompareBlockCounter => {
                let index = call.read_i16()?;
                let compare_op = call.read_i16()?;
                let rvalue = call.read_i16()?;
                let lvalue = self.counters.get(index) as i16;
                let result = compare(lvalue, compare_op, rvalue);
                self.stack.push(if result { 1 } else { 0 })?;
                Ok(Outcome::Continue)
            }

            Opcode::SetProperty => {
                let value = call.read_i16()?;
                let property_id = call.read_u32()?;
                self.properties.set(property_id, value != 0);
                Ok(Outcome::Continue)
            }

            Opcode::GetProperty => {
                call.skip(2)?;
                let property_id = call.read_u32()?;
                let value = self.properties.get(property_id);
                self.stack.push(if value { 1 } else { 0 })?;
                Ok(Outcome::Continue)
            }

            // Each choice is a (end marker, jump offset) pair; the menu
            // display opcode consumes them in reverse
            Opcode::AddMenuChoice => {
                call.skip(2)?;
                let jump_offs = call.read_i16()?;
                let end_marker = call.read_i16()?;
                self.stack.push(end_marker)?;
                self.stack.push(jump_offs)?;
                Ok(Outcome::Continue)
            }

            // Apply the jump offset of the menu choice made earlier
            Opcode::SwitchMenuChoice => Ok(Outcome::Jump(self.menu_choice_ofs as i32)),

            // Wake this thread's caller early, honoring the notify flags
            Opcode::NotifyCaller => {
                let suppressed = self
                    .threads
                    .find(call.thread_id)
                    .map(|t| t.notify_flags & NOTIFY_SUPPRESS != 0)
                    .unwrap_or(false);
                if !suppressed {
                    self.threads.notify(call.caller_thread_id);
                }
                Ok(Outcome::Continue)
            }

            _ => Err(format!(
                "Opcode {} is not a control operation",
                opcode_name(opcode)
            )),
        }
    }
}
