//! Thread-lifecycle opcodes: spawning the various thread kinds, killing,
//! scene tagging, dialogue teardown and the full game reset.

use crate::instruction::OpCall;
use crate::interpreter::Interpreter;
use crate::opcode_tables::{opcode_name, Opcode};
use crate::thread::Outcome;

pub fn is_thread_op(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::StartScriptThread
            | Opcode::StartTempScriptThread
            | Opcode::StartTimerThread
            | Opcode::StartAbortableThread
            | Opcode::StartTalkThread
            | Opcode::SetThreadSceneId
            | Opcode::EndTalkThreads
            | Opcode::KillThread
            | Opcode::ResetGame
    )
}

impl Interpreter {
    pub fn execute_thread_op(
        &mut self,
        opcode: Opcode,
        call: &mut OpCall,
    ) -> Result<Outcome, String> {
        match opcode {
            // Child threads inherit the spawning thread's context values
            Opcode::StartScriptThread => {
                call.skip(2)?;
                let code_id = call.read_u32()?;
                self.start_script_thread(code_id, call.thread_id, call.ctx)?;
                Ok(Outcome::Continue)
            }

            Opcode::StartTempScriptThread => {
                let code_offs = call.read_i16()?;
                let ip = call.code_offset(code_offs)?;
                self.threads
                    .spawn_temp_script(call.program.clone(), ip, call.thread_id, call.ctx);
                Ok(Outcome::Continue)
            }

            Opcode::StartTimerThread => {
                let is_abortable = call.read_i16()?;
                let duration = call.read_i16()?;
                let max_duration = call.read_i16()?;
                let mut ticks = duration.max(0) as u32;
                if max_duration > 0 {
                    ticks += self.rng.bounded(max_duration as u32);
                }
                self.threads
                    .spawn_timer(ticks, is_abortable != 0, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::StartAbortableThread => {
                call.skip(2)?;
                let code_offs = call.read_i16()?;
                let skip_offs = call.read_i16()?;
                let ip = call.code_offset(code_offs)?;
                let abort_ip = call.code_offset(skip_offs)?;
                self.threads
                    .spawn_abortable(call.program.clone(), ip, abort_ip, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::StartTalkThread => {
                let duration = call.read_i16()?;
                let object_id = call.read_u32()?;
                let talk_id = call.read_u32()?;
                let sequence_id1 = call.read_u32()?;
                let sequence_id2 = call.read_u32()?;
                let named_point_id = call.read_u32()?;
                let scene_id = self.engine.scenes.current_scene();
                self.threads.spawn_talk(
                    duration,
                    object_id,
                    talk_id,
                    sequence_id1,
                    sequence_id2,
                    named_point_id,
                    call.thread_id,
                    scene_id,
                );
                Ok(Outcome::Continue)
            }

            Opcode::SetThreadSceneId => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                self.threads.set_thread_scene(call.thread_id, scene_id);
                Ok(Outcome::Continue)
            }

            Opcode::EndTalkThreads => {
                for talk_id in self.threads.talk_ids() {
                    self.finish_talk(talk_id);
                }
                Ok(Outcome::Continue)
            }

            Opcode::KillThread => {
                call.skip(2)?;
                let thread_id = call.read_u32()?;
                self.threads.kill(thread_id);
                Ok(Outcome::Continue)
            }

            // Tear everything down except the thread running the reset
            Opcode::ResetGame => {
                self.threads.terminate_all_except(call.thread_id);
                self.stack.clear();
                self.counters.clear_all();
                self.properties.clear_all();
                self.menu_choice_ofs = 0;
                self.prev_scene_id = 0;
                self.scene_main_threads.clear();
                self.engine.audio.stop_music();
                self.engine.input.activate_button(0xFFFF);
                Ok(Outcome::Continue)
            }

            _ => Err(format!(
                "Opcode {} is not a thread operation",
                opcode_name(opcode)
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ScriptBuilder;
    use crate::engine_headless::headless_services;
    use crate::thread::NOTIFY_SUPPRESS;
    use test_log::test;

    const MAIN: u32 = 0x0002_0001;
    const CHILD: u32 = 0x0002_0002;

    fn interp() -> (Interpreter, crate::engine_headless::HeadlessHandles) {
        let (services, handles) = headless_services(0);
        (Interpreter::new(services), handles)
    }

    #[test]
    fn test_start_script_thread_inherits_context() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.instr(6, |a| {
            a.skip2().u32(CHILD);
        });
        sb.terminate();
        let mut child = ScriptBuilder::new();
        child.yield_turn();
        child.terminate();

        let (mut interp, _handles) = interp();
        interp.programs.insert(MAIN, sb.build());
        interp.programs.insert(CHILD, child.build());
        interp.start_script_thread(MAIN, 0, [11, 22, 33])?;
        interp.tick()?;

        let thread = interp.threads.find(CHILD).expect("child spawned");
        assert_eq!(thread.ctx, [11, 22, 33]);
        assert_eq!(thread.caller_id, MAIN);
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        Ok(())
    }

    #[test]
    fn test_temp_thread_runs_at_offset() -> Result<(), String> {
        // main: spawn temp at the code past its own epilogue, then
        // suspend; the temp increments a counter, wakes main (caller
        // notification on terminate), main terminates
        let mut sb = ScriptBuilder::new();
        sb.instr(8, |a| {
            a.i16(6); // relative to the operand area at offset 2
        });
        sb.suspend();
        sb.terminate();
        let temp_entry = sb.here();
        sb.instr(42, |a| {
            a.i16(9);
        });
        sb.terminate();
        assert_eq!(temp_entry, 8);

        let (mut interp, _handles) = interp();
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert_eq!(interp.counters.get(9), 1);
        assert!(interp.threads.is_empty());
        Ok(())
    }

    #[test]
    fn test_kill_thread_wakes_waiting_caller() -> Result<(), String> {
        // main starts child and suspends; killer kills child, which must
        // still notify main
        let mut main = ScriptBuilder::new();
        main.instr(6, |a| {
            a.skip2().u32(CHILD);
        });
        main.suspend();
        main.terminate();

        let mut child = ScriptBuilder::new();
        child.yield_turn();
        let back = child.here() as i16;
        child.jump(-(back + 4)); // back to the yield; loops until killed

        let killer_id = 0x0002_0003;
        let mut killer = ScriptBuilder::new();
        killer.yield_turn();
        killer.instr(169, |a| {
            a.skip2().u32(CHILD);
        });
        killer.terminate();

        let (mut interp, _handles) = interp();
        interp.programs.insert(MAIN, main.build());
        interp.programs.insert(CHILD, child.build());
        interp.programs.insert(killer_id, killer.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.start_script_thread(killer_id, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty(), "main must be woken and finish");
        Ok(())
    }

    #[test]
    fn test_suppressed_child_does_not_wake_caller() -> Result<(), String> {
        let mut main = ScriptBuilder::new();
        main.instr(6, |a| {
            a.skip2().u32(CHILD);
        });
        main.suspend();
        main.terminate();

        let mut child = ScriptBuilder::new();
        child.terminate();

        let (mut interp, _handles) = interp();
        interp.programs.insert(MAIN, main.build());
        interp.programs.insert(CHILD, child.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.tick()?; // spawn child, main suspends
        interp
            .threads
            .find_mut(CHILD)
            .expect("child alive")
            .notify_flags = NOTIFY_SUPPRESS;
        interp.run_until_idle()?;
        assert_eq!(
            interp.threads.live_count(),
            1,
            "main must stay suspended when notification is suppressed"
        );
        Ok(())
    }

    #[test]
    fn test_end_talk_threads_plays_post_sequence() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        // long talk on object 0x40001, then end all talk threads
        sb.instr(56, |a| {
            a.i16(1000)
                .u32(0x0004_0001)
                .u32(0x000B_0001)
                .u32(0x0006_0010)
                .u32(0x0006_0011)
                .u32(0x0007_0001);
        });
        sb.yield_turn();
        sb.yield_turn();
        sb.instr(15, |_| {});
        sb.terminate();

        let (mut interp, handles) = interp();
        interp
            .engine
            .objects
            .place_actor(0x0005_0001, crate::util::Point::new(0, 0), 0, 0x0004_0001, 0);
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        let log = handles.log.borrow();
        assert!(
            log.iter().any(|line| line.contains("sequence 00060010")),
            "pre sequence must start: {:?}",
            log
        );
        assert!(
            log.iter().any(|line| line.contains("sequence 00060011")),
            "post sequence must play on teardown: {:?}",
            log
        );
        Ok(())
    }

    #[test]
    fn test_reset_game_clears_state() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.yield_turn();
        sb.instr(84, |_| {});
        sb.terminate();

        let (mut interp, handles) = interp();
        interp.programs.insert(MAIN, sb.build());
        interp.programs.insert(CHILD, {
            let mut child = ScriptBuilder::new();
            child.suspend();
            child.terminate();
            child.build()
        });
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.start_script_thread(CHILD, 0, [0, 0, 0])?;
        interp.counters.set(1, 5);
        interp.properties.set(0x0009_0001, true);
        interp.stack.push(3)?;
        interp.run_until_idle()?;

        assert!(interp.threads.is_empty());
        assert_eq!(interp.counters.get(1), 0);
        assert!(!interp.properties.get(0x0009_0001));
        assert_eq!(interp.stack.depth(), 0);
        let log = handles.log.borrow();
        assert!(log.iter().any(|line| line.contains("audio.music.stop")));
        assert!(log.iter().any(|line| line.contains("input.button.on FFFF")));
        Ok(())
    }

    #[test]
    fn test_abortable_thread_runs_abort_path_on_signal() -> Result<(), String> {
        // main body loops forever; abort path increments counter 8 and
        // terminates
        let mut sb = ScriptBuilder::new();
        sb.instr(168, |a| {
            a.skip2().i16(10).i16(16); // body and abort path, operand-relative
        });
        sb.suspend();
        sb.terminate();
        let body = sb.here();
        sb.yield_turn();
        sb.jump(-6); // back to the yield
        let abort_path = sb.here();
        sb.instr(42, |a| {
            a.i16(8);
        });
        sb.terminate();
        // operand area of the spawn instruction is at offset 2
        assert_eq!(body, 12);
        assert_eq!(abort_path, 18);

        let (mut interp, handles) = interp();
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        for _ in 0..3 {
            interp.tick()?;
        }
        assert_eq!(interp.counters.get(8), 0);
        handles.abort.set(true);
        interp.run_until_idle()?;
        assert_eq!(interp.counters.get(8), 1, "abort path must run");
        assert!(interp.threads.is_empty(), "everything winds down");
        Ok(())
    }
}
