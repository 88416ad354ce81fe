//! Scene lifecycle, camera, resource, menu, input-gating and screen
//! opcodes.
//!
//! Scene transitions follow a fixed shape: drop stale input, remember the
//! outgoing scene, tear down, bring up the new one and hand it a fresh
//! anonymous thread carrying the invoking thread's context values. Modal
//! and close-up scenes pause the underlying scene instead of tearing it
//! down.

use crate::engine::MenuChoice;
use crate::instruction::OpCall;
use crate::interpreter::Interpreter;
use crate::opcode_tables::{opcode_name, Opcode};
use crate::thread::Outcome;
use crate::util::Point;
use log::warn;

pub fn is_scene_op(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::LoadResource
            | Opcode::UnloadResource
            | Opcode::EnterScene
            | Opcode::ChangeScene
            | Opcode::StartModalScene
            | Opcode::ExitModalScene
            | Opcode::EnterCloseUpScene
            | Opcode::ExitCloseUpScene
            | Opcode::PanCenterObject
            | Opcode::PanToObject
            | Opcode::PanToNamedPoint
            | Opcode::PanToPoint
            | Opcode::PanStop
            | Opcode::SetDisplay
            | Opcode::PlayVideo
            | Opcode::SetFontId
            | Opcode::IsPrevSceneId
            | Opcode::IsCurrentSceneId
            | Opcode::IsActiveSceneId
            | Opcode::SetSceneIdThreadId
            | Opcode::ChangeSceneAll
            | Opcode::DisplayMenu
            | Opcode::AddMenuKey
            | Opcode::ActivateButton
            | Opcode::DeactivateButton
            | Opcode::LoadSpecialCodeModule
            | Opcode::RunSpecialCode
    )
}

impl Interpreter {
    pub fn execute_scene_op(
        &mut self,
        opcode: Opcode,
        call: &mut OpCall,
    ) -> Result<Outcome, String> {
        match opcode {
            Opcode::LoadResource => {
                call.skip(2)?;
                let resource_id = call.read_u32()?;
                let scene_id = self.engine.scenes.current_scene();
                self.engine
                    .resources
                    .load(resource_id, scene_id, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::UnloadResource => {
                call.skip(2)?;
                let resource_id = call.read_u32()?;
                self.engine.resources.unload(resource_id);
                Ok(Outcome::Continue)
            }

            // A scene that cannot come up terminates the thread that
            // asked for it instead of crashing the run
            Opcode::EnterScene => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                if !self.engine.scenes.enter_scene(scene_id, call.thread_id) {
                    return Ok(Outcome::Terminate);
                }
                Ok(Outcome::Continue)
            }

            Opcode::ChangeScene => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                let code_id = call.read_u32()?;
                self.engine.input.discard_events();
                self.prev_scene_id = self.engine.scenes.current_scene();
                self.engine.scenes.exit_scene(call.thread_id);
                if !self.engine.scenes.enter_scene(scene_id, call.thread_id) {
                    warn!("changeScene could not enter {:08X}", scene_id);
                }
                self.start_anon_script_thread(code_id, 0, call.ctx)?;
                Ok(Outcome::Continue)
            }

            // The underlying scene freezes and the invoking thread parks
            // until the modal scene's script wakes it
            Opcode::StartModalScene => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                let code_id = call.read_u32()?;
                self.engine.input.discard_events();
                let current = self.engine.scenes.current_scene();
                self.engine.scenes.enter_pause(call.thread_id);
                self.threads.pause_by_scene(current);
                self.engine.scenes.enter_scene(scene_id, call.thread_id);
                self.start_script_thread(code_id, 0, call.ctx)?;
                Ok(Outcome::Suspend)
            }

            Opcode::ExitModalScene => {
                self.engine.input.discard_events();
                self.engine.scenes.exit_scene(call.thread_id);
                self.engine.scenes.leave_pause(call.thread_id);
                let current = self.engine.scenes.current_scene();
                self.threads.unpause_by_scene(current);
                Ok(Outcome::Continue)
            }

            Opcode::EnterCloseUpScene => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                self.engine.input.discard_events();
                let current = self.engine.scenes.current_scene();
                self.engine.scenes.enter_pause(call.thread_id);
                self.threads.pause_by_scene(current);
                self.engine.scenes.enter_scene(scene_id, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::ExitCloseUpScene => {
                self.engine.scenes.exit_scene(call.thread_id);
                self.engine.scenes.leave_pause(call.thread_id);
                let current = self.engine.scenes.current_scene();
                self.threads.unpause_by_scene(current);
                Ok(Outcome::Yield)
            }

            Opcode::PanCenterObject => {
                let speed = call.read_i16()?;
                let object_id = call.read_u32()?;
                self.engine.camera.pan_center_on_object(object_id, speed);
                Ok(Outcome::Continue)
            }

            Opcode::PanToObject => {
                let speed = call.read_i16()?;
                let object_id = call.read_u32()?;
                let pos = self.control_for(object_id)?.position();
                self.engine.camera.pan_to_point(pos, speed, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::PanToNamedPoint => {
                let speed = call.read_i16()?;
                let named_point_id = call.read_u32()?;
                let pos = self.engine.scenes.named_point(named_point_id);
                self.engine.camera.pan_to_point(pos, speed, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::PanToPoint => {
                let speed = call.read_i16()?;
                let x = call.read_i16()?;
                let y = call.read_i16()?;
                self.engine
                    .camera
                    .pan_to_point(Point::new(x, y), speed, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::PanStop => {
                self.engine.camera.stop_pan();
                Ok(Outcome::Continue)
            }

            Opcode::SetDisplay => {
                let flag = call.read_i16()?;
                self.engine.screen.set_display_on(flag != 0);
                Ok(Outcome::Continue)
            }

            Opcode::PlayVideo => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                let video_id = call.read_u32()?;
                let priority = call.read_u32()?;
                self.engine
                    .screen
                    .play_video(video_id, object_id, priority, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::SetFontId => {
                call.skip(2)?;
                let font_id = call.read_u32()?;
                self.engine.screen.set_font(font_id);
                Ok(Outcome::Continue)
            }

            Opcode::IsPrevSceneId => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                let result = self.prev_scene_id == scene_id;
                self.stack.push(if result { 1 } else { 0 })?;
                Ok(Outcome::Continue)
            }

            Opcode::IsCurrentSceneId => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                let result = self.engine.scenes.current_scene() == scene_id;
                self.stack.push(if result { 1 } else { 0 })?;
                Ok(Outcome::Continue)
            }

            Opcode::IsActiveSceneId => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                let result = self.engine.scenes.is_scene_active(scene_id);
                self.stack.push(if result { 1 } else { 0 })?;
                Ok(Outcome::Continue)
            }

            Opcode::SetSceneIdThreadId => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                let thread_id = call.read_u32()?;
                self.scene_main_threads.insert(scene_id, thread_id);
                Ok(Outcome::Continue)
            }

            // Tear active scenes down to the global backdrop, then enter
            // the new scene like a normal change
            Opcode::ChangeSceneAll => {
                call.skip(2)?;
                let scene_id = call.read_u32()?;
                let code_id = call.read_u32()?;
                self.engine.input.discard_events();
                self.prev_scene_id = self.engine.scenes.current_scene();
                let global = self.global_scene_id;
                self.engine
                    .scenes
                    .dump_active_scenes(global, call.thread_id);
                self.engine.scenes.enter_scene(scene_id, call.thread_id);
                self.start_anon_script_thread(code_id, 0, call.ctx)?;
                Ok(Outcome::Continue)
            }

            // Consume the collected (end marker, jump offset) pairs and
            // hand them to the shell; the chosen offset comes back as a
            // MenuChoice signal
            Opcode::DisplayMenu => {
                let kind = call.read_i16()?;
                let menu_id = call.read_u32()?;
                let flags = call.read_u32()?;
                let mut choices = Vec::new();
                loop {
                    let jump_ofs = self.stack.pop()?;
                    let end_marker = self.stack.pop()?;
                    choices.push(MenuChoice {
                        jump_ofs,
                        end_marker,
                    });
                    if end_marker != 0 {
                        break;
                    }
                }
                self.engine
                    .menus
                    .display_menu(&choices, menu_id, kind, flags, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::AddMenuKey => {
                call.skip(2)?;
                let key = call.read_u32()?;
                let thread_id = call.read_u32()?;
                self.engine.input.add_menu_key(key, thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::ActivateButton => {
                let button = call.read_i16()?;
                self.engine.input.activate_button(button as u16);
                Ok(Outcome::Continue)
            }

            Opcode::DeactivateButton => {
                let button = call.read_i16()?;
                self.engine.input.deactivate_button(button as u16);
                Ok(Outcome::Continue)
            }

            Opcode::LoadSpecialCodeModule => {
                call.skip(2)?;
                let module_id = call.read_u32()?;
                self.engine.resources.load(module_id, 0, 0);
                Ok(Outcome::Continue)
            }

            // Secondary dispatch into game-specific native code; the
            // module may read further operands from the call
            Opcode::RunSpecialCode => {
                call.skip(2)?;
                let special_code_id = call.read_u32()?;
                self.engine.special.run(special_code_id, call)?;
                Ok(Outcome::Continue)
            }

            _ => Err(format!(
                "Opcode {} is not a scene operation",
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
    use test_log::test;

    const MAIN: u32 = 0x0002_0001;

    fn interp() -> (Interpreter, crate::engine_headless::HeadlessHandles) {
        let (services, handles) = headless_services(0);
        (Interpreter::new(services), handles)
    }

    #[test]
    fn test_enter_scene_failure_terminates_thread() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.instr(20, |a| {
            a.skip2().u32(0x0001_0BAD);
        });
        sb.instr(42, |a| {
            a.i16(0);
        });
        sb.terminate();

        let (mut interp, handles) = interp();
        handles.fail_scenes.borrow_mut().insert(0x0001_0BAD);
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        assert_eq!(
            interp.counters.get(0),
            0,
            "code after the failed enter must not run"
        );
        Ok(())
    }

    #[test]
    fn test_scene_identity_queries() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.instr(105, |a| {
            a.skip2().u32(0x0001_0002); // current?
        });
        sb.instr(106, |a| {
            a.skip2().u32(0x0001_0001); // active?
        });
        sb.instr(104, |a| {
            a.skip2().u32(0x0001_0099); // previous?
        });
        sb.terminate();

        let (mut interp, _handles) = interp();
        interp.engine.scenes.enter_scene(0x0001_0001, 0);
        interp.engine.scenes.enter_scene(0x0001_0002, 0);
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert_eq!(interp.stack.pop()?, 0, "0x00010099 was never previous");
        assert_eq!(interp.stack.pop()?, 1, "0x00010001 is active below top");
        assert_eq!(interp.stack.pop()?, 1, "0x00010002 is current");
        Ok(())
    }

    #[test]
    fn test_display_menu_consumes_choice_pairs() -> Result<(), String> {
        // one terminal pair below two open pairs; the pop loop stops on
        // the non-zero end marker with nothing left on the stack
        let mut sb = ScriptBuilder::new();
        sb.instr(80, |a| {
            a.skip2().i16(10).i16(1);
        });
        sb.instr(80, |a| {
            a.skip2().i16(20).i16(0);
        });
        sb.instr(80, |a| {
            a.skip2().i16(30).i16(0);
        });
        sb.instr(81, |a| {
            a.i16(0).u32(0x000C_0001).u32(0);
        });
        sb.suspend();
        sb.terminate();

        let (mut interp, _handles) = interp();
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty(), "menu choice must wake the thread");
        assert_eq!(interp.stack.depth(), 0, "all pairs consumed");
        Ok(())
    }

    #[test]
    fn test_menu_choice_drives_switch_jump() -> Result<(), String> {
        // choice jump offset skips the first increment after the switch
        let mut sb = ScriptBuilder::new();
        sb.instr(80, |a| {
            a.skip2().i16(4).i16(1); // single choice: jump +4
        });
        sb.instr(81, |a| {
            a.i16(0).u32(0x000C_0002).u32(0);
        });
        sb.suspend();
        sb.instr(82, |_| {}); // switchMenuChoice
        sb.instr(42, |a| {
            a.i16(1); // skipped by the +4
        });
        sb.instr(42, |a| {
            a.i16(2);
        });
        sb.terminate();

        let (mut interp, _handles) = interp();
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert_eq!(interp.counters.get(1), 0);
        assert_eq!(interp.counters.get(2), 1);
        Ok(())
    }

    #[test]
    fn test_change_scene_spawns_anon_thread_with_context() -> Result<(), String> {
        const NEXT_CODE: u32 = 0x0002_0031;
        let mut sb = ScriptBuilder::new();
        sb.instr(25, |a| {
            a.skip2().u32(0x0001_0031).u32(NEXT_CODE);
        });
        sb.terminate();

        let mut next = ScriptBuilder::new();
        next.terminate();

        let (mut interp, handles) = interp();
        interp.engine.scenes.enter_scene(0x0001_0007, 0);
        interp.programs.insert(MAIN, sb.build());
        interp.programs.insert(NEXT_CODE, next.build());
        interp.start_script_thread(MAIN, 0, [7, 8, 9])?;
        interp.tick()?;

        // the new scene's thread is anonymous but carries the context
        let spawned: Vec<_> = interp
            .threads
            .live_ids()
            .into_iter()
            .filter(|&id| id != MAIN)
            .collect();
        assert_eq!(spawned.len(), 1);
        let thread = interp.threads.find(spawned[0]).unwrap();
        assert_eq!(thread.ctx, [7, 8, 9]);
        assert_eq!(thread.caller_id, 0);

        assert_eq!(interp.prev_scene_id, 0x0001_0007);
        assert!(interp.engine.scenes.is_scene_active(0x0001_0031));
        assert!(!interp.engine.scenes.is_scene_active(0x0001_0007));
        let log = handles.log.borrow();
        assert!(log.iter().any(|l| l.starts_with("input.discard")));
        drop(log);
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        Ok(())
    }

    #[test]
    fn test_modal_scene_pauses_and_suspends() -> Result<(), String> {
        const MODAL_CODE: u32 = 0x0002_0040;
        let mut sb = ScriptBuilder::new();
        sb.instr(14, |a| {
            a.skip2().u32(0x0001_0001); // tag self with the base scene
        });
        sb.instr(26, |a| {
            a.skip2().u32(0x0001_0040).u32(MODAL_CODE);
        });
        sb.terminate();

        // modal script: exit the modal scene, wake the invoker, done
        let mut modal = ScriptBuilder::new();
        modal.instr(27, |_| {});
        modal.instr(169, |a| {
            a.skip2().u32(MAIN); // kill the parked invoker
        });
        modal.terminate();

        let (mut interp, _handles) = interp();
        interp.engine.scenes.enter_scene(0x0001_0001, 0);
        interp.programs.insert(MAIN, sb.build());
        interp.programs.insert(MODAL_CODE, modal.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.tick()?;

        assert!(!interp.threads.is_runnable(MAIN), "invoker must be parked");
        assert!(interp.engine.scenes.is_scene_active(0x0001_0040));
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty());
        assert!(!interp.engine.scenes.is_scene_active(0x0001_0040));
        Ok(())
    }

    #[test]
    fn test_pan_and_video_record_requests() -> Result<(), String> {
        let mut sb = ScriptBuilder::new();
        sb.instr(36, |a| {
            a.i16(3).i16(100).i16(50); // panToPoint
        });
        sb.instr(37, |_| {}); // panStop
        sb.instr(144, |a| {
            a.skip2().u32(0x0004_0002).u32(0x000E_0001).u32(2); // playVideo
        });
        sb.suspend();
        sb.terminate();

        let (mut interp, handles) = interp();
        interp.programs.insert(MAIN, sb.build());
        interp.start_script_thread(MAIN, 0, [0, 0, 0])?;
        interp.run_until_idle()?;
        assert!(interp.threads.is_empty(), "video completion wakes thread");
        let log = handles.log.borrow();
        assert!(log.iter().any(|l| l.contains("camera.pan 100,50 speed 3")));
        assert!(log.iter().any(|l| l.contains("camera.stop")));
        assert!(log.iter().any(|l| l.contains("screen.video 000E0001")));
        Ok(())
    }
}
