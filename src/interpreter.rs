use crate::config::{InterpreterConfig, UnknownOpcodePolicy};
use crate::engine::{EngineServices, EngineSignal};
use crate::instruction::{OpCall, INSTR_HEADER_LEN};
use crate::opcode_tables::{opcode_from_byte, opcode_name, Opcode};
use crate::opcodes_actor::is_actor_op;
use crate::opcodes_control::is_control_op;
use crate::opcodes_scene::is_scene_op;
use crate::opcodes_thread::is_thread_op;
use crate::programs::ProgramStore;
use crate::stack::ScriptStack;
use crate::thread::{Outcome, ThreadKind};
use crate::threads::ThreadManager;
use crate::values::{BlockCounters, Properties};
use crate::vmrand::VmRand;
use log::{debug, error, info};
use std::collections::HashMap;

/// The script virtual machine.
///
/// Owns every shared store (stack, counters, properties, thread table)
/// and the engine service handles, and runs the cooperative scheduler:
/// one round gives each live, unpaused thread one turn, and a script
/// thread's turn executes instructions until a handler suspends, yields
/// or terminates it. Exactly one handler runs at a time, so handler side
/// effects are ordered before the next dispatch by construction.
pub struct Interpreter {
    pub config: InterpreterConfig,
    pub stack: ScriptStack,
    pub counters: BlockCounters,
    pub properties: Properties,
    pub threads: ThreadManager,
    pub programs: ProgramStore,
    pub engine: EngineServices,
    pub rng: VmRand,
    /// Scene that was current before the last scene change
    pub(crate) prev_scene_id: u32,
    /// Backdrop scene that survives a change-scene-all teardown
    pub(crate) global_scene_id: u32,
    /// Jump offset of the most recent menu choice
    pub(crate) menu_choice_ofs: i16,
    /// Main-thread id registered per scene
    pub(crate) scene_main_threads: HashMap<u32, u32>,
    round: u64,
}

impl Interpreter {
    pub fn new(engine: EngineServices) -> Self {
        Self::with_config(engine, InterpreterConfig::default())
    }

    pub fn with_config(engine: EngineServices, config: InterpreterConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => VmRand::new_predictable(seed),
            None => VmRand::new_uniform(),
        };
        Interpreter {
            config,
            stack: ScriptStack::new(),
            counters: BlockCounters::new(),
            properties: Properties::new(),
            threads: ThreadManager::new(),
            programs: ProgramStore::new(),
            engine,
            rng,
            prev_scene_id: 0,
            global_scene_id: 0,
            menu_choice_ofs: 0,
            scene_main_threads: HashMap::new(),
            round: 0,
        }
    }

    pub fn set_global_scene(&mut self, scene_id: u32) {
        self.global_scene_id = scene_id;
    }

    /// Start a named script thread from a registered code id
    pub fn start_script_thread(
        &mut self,
        code_id: u32,
        caller_id: u32,
        ctx: [u32; 3],
    ) -> Result<u32, String> {
        let program = self.programs.code(code_id)?;
        self.threads.spawn_script(code_id, program, caller_id, ctx)
    }

    /// Start an anonymous thread over a named code blob (scene changes)
    pub fn start_anon_script_thread(
        &mut self,
        code_id: u32,
        caller_id: u32,
        ctx: [u32; 3],
    ) -> Result<u32, String> {
        let program = self.programs.code(code_id)?;
        Ok(self.threads.spawn_temp_script(program, 0, caller_id, ctx))
    }

    /// Run one scheduler round
    pub fn tick(&mut self) -> Result<(), String> {
        self.round += 1;
        self.drain_signals();
        for thread_id in self.threads.live_ids() {
            if self.threads.is_runnable(thread_id) {
                self.run_turn(thread_id)?;
            }
        }
        self.threads.reap();
        Ok(())
    }

    /// Run rounds until no thread remains, or until every survivor is
    /// parked with nothing queued to wake it.
    pub fn run_until_idle(&mut self) -> Result<u64, String> {
        let mut rounds: u64 = 0;
        while !self.threads.is_empty() {
            if self.threads.runnable_count() == 0 && self.engine.signals.borrow().is_empty() {
                info!(
                    "{} thread(s) suspended with no pending wakeups; going idle",
                    self.threads.live_count()
                );
                break;
            }
            if rounds >= self.config.max_rounds {
                return Err(format!(
                    "Scheduler exceeded {} rounds without finishing",
                    self.config.max_rounds
                ));
            }
            self.tick()?;
            rounds += 1;
        }
        Ok(rounds)
    }

    fn drain_signals(&mut self) {
        loop {
            let signal = self.engine.signals.borrow_mut().pop_front();
            match signal {
                Some(EngineSignal::Notify(thread_id)) => self.threads.notify(thread_id),
                Some(EngineSignal::MenuChoice {
                    thread_id,
                    jump_ofs,
                }) => {
                    debug!("menu choice {} for thread {:08X}", jump_ofs, thread_id);
                    self.menu_choice_ofs = jump_ofs;
                    self.threads.notify(thread_id);
                }
                None => break,
            }
        }
    }

    fn run_turn(&mut self, thread_id: u32) -> Result<(), String> {
        enum Turn {
            Script,
            Timer,
            Abortable,
            Talk,
        }
        let turn = match self.threads.find(thread_id) {
            Some(thread) => match thread.kind {
                ThreadKind::Script(_) => Turn::Script,
                ThreadKind::Timer(_) => Turn::Timer,
                ThreadKind::Abortable(_) => Turn::Abortable,
                ThreadKind::Talk(_) => Turn::Talk,
            },
            None => return Ok(()),
        };
        match turn {
            Turn::Script => self.run_script_turn(thread_id),
            Turn::Timer => self.run_timer_turn(thread_id),
            Turn::Abortable => self.run_abortable_turn(thread_id),
            Turn::Talk => self.run_talk_turn(thread_id),
        }
    }

    /// A script thread's turn: dispatch until a handler gives the turn up
    fn run_script_turn(&mut self, thread_id: u32) -> Result<(), String> {
        let mut executed: u64 = 0;
        while self.threads.is_runnable(thread_id) {
            executed += 1;
            if executed > self.config.max_turn_instructions {
                return Err(format!(
                    "Thread {:08X} ran {} instructions without yielding",
                    thread_id, executed
                ));
            }
            match self.step(thread_id)? {
                Outcome::Continue | Outcome::Jump(_) => {}
                Outcome::Yield => break,
                Outcome::Suspend => {
                    self.threads.suspend(thread_id);
                    break;
                }
                Outcome::Terminate => {
                    self.threads.terminate(thread_id);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Fetch, decode and execute one instruction of a script thread
    fn step(&mut self, thread_id: u32) -> Result<Outcome, String> {
        let (program, ip, caller_id, ctx) = {
            let thread = self
                .threads
                .find(thread_id)
                .ok_or_else(|| format!("Dispatch on dead thread {:08X}", thread_id))?;
            let ThreadKind::Script(task) = &thread.kind else {
                return Err(format!("Thread {:08X} has no code to dispatch", thread_id));
            };
            (task.program.clone(), task.ip, thread.caller_id, thread.ctx)
        };

        let mut call = OpCall::new(program, ip, thread_id, caller_id, ctx)?;
        if (call.op_len as usize) < INSTR_HEADER_LEN {
            return Err(format!(
                "Opcode {} at {:#x} encodes impossible length {}",
                call.op, ip, call.op_len
            ));
        }
        let Some(opcode) = opcode_from_byte(call.op) else {
            let diagnostic = format!(
                "Unknown opcode {} at {:#x} in thread {:08X}",
                call.op, ip, thread_id
            );
            return match self.config.unknown_opcode {
                UnknownOpcodePolicy::Fail => Err(diagnostic),
                UnknownOpcodePolicy::TerminateThread => {
                    error!("{}", diagnostic);
                    Ok(Outcome::Terminate)
                }
            };
        };

        debug!(
            "[{:08X}] {:#x}: {} ({})",
            thread_id,
            ip,
            opcode_name(opcode),
            call.op
        );
        let outcome = self.execute(opcode, &mut call)?;

        // The dispatcher alone owns the program counter: advance past the
        // encoded instruction, displaced by the handler's jump delta.
        let delta = match outcome {
            Outcome::Jump(delta) => delta,
            _ => 0,
        };
        let next_ip = ip as i64 + call.op_len as i64 + delta as i64;
        if next_ip < 0 {
            return Err(format!(
                "Jump by {} from {:#x} leaves the program (thread {:08X})",
                delta, ip, thread_id
            ));
        }
        if let Some(thread) = self.threads.find_mut(thread_id) {
            if let ThreadKind::Script(task) = &mut thread.kind {
                task.ip = next_ip as usize;
            }
        }
        Ok(outcome)
    }

    fn execute(&mut self, opcode: Opcode, call: &mut OpCall) -> Result<Outcome, String> {
        if is_control_op(opcode) {
            self.execute_control_op(opcode, call)
        } else if is_thread_op(opcode) {
            self.execute_thread_op(opcode, call)
        } else if is_scene_op(opcode) {
            self.execute_scene_op(opcode, call)
        } else if is_actor_op(opcode) {
            self.execute_actor_op(opcode, call)
        } else {
            Err(format!(
                "Opcode {} has no handler category",
                opcode_name(opcode)
            ))
        }
    }

    fn run_timer_turn(&mut self, thread_id: u32) -> Result<(), String> {
        let (abortable, notified) = match self.threads.find(thread_id) {
            Some(thread) => match &thread.kind {
                ThreadKind::Timer(task) => (task.abortable, thread.notified),
                _ => return Ok(()),
            },
            None => return Ok(()),
        };

        let mut expire = notified;
        if !expire && abortable && self.engine.input.poll_abort() {
            debug!("timer thread {:08X} aborted", thread_id);
            expire = true;
        }
        if !expire {
            if let Some(thread) = self.threads.find_mut(thread_id) {
                if let ThreadKind::Timer(task) = &mut thread.kind {
                    task.remaining = task.remaining.saturating_sub(1);
                    expire = task.remaining == 0;
                }
            }
        }
        if expire {
            self.threads.terminate(thread_id);
        }
        Ok(())
    }

    fn run_abortable_turn(&mut self, thread_id: u32) -> Result<(), String> {
        let (inner_id, aborted, abort_ip, program, notified) = match self.threads.find(thread_id) {
            Some(thread) => match &thread.kind {
                ThreadKind::Abortable(task) => (
                    task.inner_id,
                    task.aborted,
                    task.abort_ip,
                    task.program.clone(),
                    thread.notified,
                ),
                _ => return Ok(()),
            },
            None => return Ok(()),
        };

        // The watched code finished (inner thread notified us): done.
        if notified {
            self.threads.terminate(thread_id);
            return Ok(());
        }

        if !aborted && self.engine.input.poll_abort() {
            debug!(
                "abortable thread {:08X} cut short; running abort path at {:#x}",
                thread_id, abort_ip
            );
            self.threads.kill(inner_id);
            // The kill notified us as the inner thread's caller; that is
            // not a completion, so swallow it before starting the abort
            // path.
            if let Some(thread) = self.threads.find_mut(thread_id) {
                thread.notified = false;
            }
            let abort_thread_id =
                self.threads
                    .spawn_temp_script(program, abort_ip, thread_id, [0, 0, 0]);
            if let Some(thread) = self.threads.find_mut(thread_id) {
                if let ThreadKind::Abortable(task) = &mut thread.kind {
                    task.aborted = true;
                    task.inner_id = abort_thread_id;
                }
            }
        }
        Ok(())
    }

    fn run_talk_turn(&mut self, thread_id: u32) -> Result<(), String> {
        let (object_id, seq_pre, started, notified) = match self.threads.find(thread_id) {
            Some(thread) => match &thread.kind {
                ThreadKind::Talk(task) => {
                    (task.object_id, task.seq_pre, task.started, thread.notified)
                }
                _ => return Ok(()),
            },
            None => return Ok(()),
        };

        if !started {
            match self.engine.objects.control(object_id) {
                Some(control) => control.start_sequence(seq_pre, 0),
                None => {
                    return Err(format!(
                        "Talk thread {:08X} on unresolved object {:08X}",
                        thread_id, object_id
                    ))
                }
            }
            if let Some(thread) = self.threads.find_mut(thread_id) {
                if let ThreadKind::Talk(task) = &mut thread.kind {
                    task.started = true;
                }
            }
        }

        let mut finish = notified;
        if !finish {
            if let Some(thread) = self.threads.find_mut(thread_id) {
                if let ThreadKind::Talk(task) = &mut thread.kind {
                    if task.remaining > 0 {
                        task.remaining -= 1;
                        finish = task.remaining == 0;
                    }
                }
            }
        }
        if finish {
            self.finish_talk(thread_id);
        }
        Ok(())
    }

    /// Play a talk thread's post sequence and tear it down. Also used by
    /// the end-talk-threads opcode.
    pub(crate) fn finish_talk(&mut self, thread_id: u32) {
        let payload = self.threads.find(thread_id).and_then(|thread| match &thread.kind {
            ThreadKind::Talk(task) => Some((task.object_id, task.seq_post)),
            _ => None,
        });
        if let Some((object_id, seq_post)) = payload {
            if let Some(control) = self.engine.objects.control(object_id) {
                control.start_sequence(seq_post, 0);
            }
            self.threads.terminate(thread_id);
        }
    }

    /// Resolve an object id to its control, as most actor opcodes do.
    /// The handful of opcodes with a documented not-found fallback call
    /// the directory themselves instead.
    pub(crate) fn control_for(
        &mut self,
        object_id: u32,
    ) -> Result<&mut dyn crate::engine::Control, String> {
        self.engine
            .objects
            .control(object_id)
            .ok_or_else(|| format!("No control for object {:08X}", object_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ScriptBuilder;
    use crate::engine_headless::headless_services;
    use test_log::test;

    fn interp_with(code: Vec<u8>) -> Interpreter {
        let (services, _handles) = headless_services(0);
        let mut interp = Interpreter::new(services);
        interp.programs.insert(0x0002_0001, code);
        interp
            .start_script_thread(0x0002_0001, 0, [0, 0, 0])
            .unwrap();
        interp
    }

    #[test]
    fn test_jump_is_relative_to_instruction_end() -> Result<(), String> {
        // offsets apply after the jump's own 4 encoded bytes, so +2
        // lands exactly on the terminate
        let mut sb = ScriptBuilder::new();
        sb.jump(2); // skip the next 2-byte instruction
        sb.instr(176, |_| {}); // stackPush0 (skipped)
        sb.terminate();
        let mut interp = interp_with(sb.build());
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        assert_eq!(interp.stack.depth(), 0);
        Ok(())
    }

    #[test]
    fn test_backward_jump_loops() -> Result<(), String> {
        // push0 / incCounter via loop would spin forever; use yield so
        // each round executes one pass, then kill after checking
        let mut sb = ScriptBuilder::new();
        sb.instr(42, |a| {
            a.i16(3);
        }); // incBlockCounter(3)
        sb.yield_turn();
        let after_yield = sb.here() as i16;
        sb.jump(-(after_yield + 4)); // back to start: jump is 4 bytes
        let mut interp = interp_with(sb.build());
        interp.tick()?;
        interp.tick()?;
        interp.tick()?;
        assert_eq!(interp.counters.get(3), 3);
        interp.threads.kill(0x0002_0001);
        Ok(())
    }

    #[test]
    fn test_unknown_opcode_fails_by_default() {
        let mut sb = ScriptBuilder::new();
        sb.instr(7, |_| {}); // 7 is an unassigned slot
        let mut interp = interp_with(sb.build());
        let err = interp.tick().unwrap_err();
        assert!(err.contains("Unknown opcode 7"), "got: {}", err);
        assert!(err.contains("00020001"), "got: {}", err);
    }

    #[test]
    fn test_unknown_opcode_can_terminate_thread() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.instr(255, |_| {});
        let (services, _handles) = headless_services(0);
        let mut config = InterpreterConfig::default();
        config.unknown_opcode = UnknownOpcodePolicy::TerminateThread;
        let mut interp = Interpreter::with_config(services, config);
        interp.programs.insert(0x0002_0001, sb.build());
        interp.start_script_thread(0x0002_0001, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        Ok(())
    }

    #[test]
    fn test_yield_defers_to_next_round() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.instr(42, |a| {
            a.i16(0);
        });
        sb.yield_turn();
        sb.instr(42, |a| {
            a.i16(0);
        });
        sb.terminate();
        let mut interp = interp_with(sb.build());
        interp.tick()?;
        assert_eq!(interp.counters.get(0), 1, "second half must wait a round");
        interp.tick()?;
        assert_eq!(interp.counters.get(0), 2);
        assert!(interp.threads.is_empty());
        Ok(())
    }

    #[test]
    fn test_suspend_waits_for_notify() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.suspend();
        sb.instr(42, |a| {
            a.i16(1);
        });
        sb.terminate();
        let mut interp = interp_with(sb.build());
        interp.tick()?;
        interp.tick()?;
        assert_eq!(interp.counters.get(1), 0, "suspended thread must not run");
        assert_eq!(interp.threads.live_count(), 1);

        interp.threads.notify(0x0002_0001);
        interp.tick()?;
        assert_eq!(interp.counters.get(1), 1);
        assert!(interp.threads.is_empty());
        Ok(())
    }

    #[test]
    fn test_timer_thread_expires_and_notifies() -> Result<(), String> {
        // caller starts a 3-tick timer, then suspends awaiting it
        let mut sb = ScriptBuilder::new();
        sb.instr(9, |a| {
            a.i16(0).i16(3).i16(0);
        }); // startTimerThread(plain, 3, no jitter)
        sb.suspend();
        sb.terminate();
        let mut interp = interp_with(sb.build());
        let rounds = interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        assert!(rounds >= 3, "timer must take its ticks, ran {}", rounds);
        Ok(())
    }
}
