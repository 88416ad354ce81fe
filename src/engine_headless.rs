//! Recording engine backends for tests, tools and the headless runner.
//!
//! Every service appends a line per call to a shared event log and
//! completes asynchronous requests immediately by pushing the matching
//! signal, so scripts that wait on pans, music or menus run to completion
//! without a real engine behind them.

use crate::engine::{
    AudioHost, CameraHost, Control, EngineServices, EngineSignal, InputHost, MenuChoice, MenuHost,
    ObjectDirectory, ResourceHost, SceneHost, ScreenHost, SignalQueue, SpecialCode, UiSoundSlot,
    new_signal_queue,
};
use crate::instruction::OpCall;
use crate::util::Point;
use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub type EventLog = Rc<RefCell<Vec<String>>>;

/// Shared handles into the headless services, for tests and the runner
pub struct HeadlessHandles {
    pub log: EventLog,
    pub signals: SignalQueue,
    /// Set to make the next abort poll fire
    pub abort: Rc<Cell<bool>>,
    /// Scene ids whose enter_scene calls report failure
    pub fail_scenes: Rc<RefCell<HashSet<u32>>>,
}

/// Build a full headless service set. `auto_menu_choice` selects which
/// collected menu entry the stand-in shell resolves menus with.
pub fn headless_services(auto_menu_choice: usize) -> (EngineServices, HeadlessHandles) {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let signals = new_signal_queue();
    let abort = Rc::new(Cell::new(false));
    let fail_scenes = Rc::new(RefCell::new(HashSet::new()));

    let services = EngineServices {
        scenes: Box::new(HeadlessScenes {
            log: log.clone(),
            stack: Vec::new(),
            pause_depth: 0,
            fail_scenes: fail_scenes.clone(),
        }),
        objects: Box::new(HeadlessObjects {
            log: log.clone(),
            signals: signals.clone(),
            controls: HashMap::new(),
        }),
        camera: Box::new(HeadlessCamera {
            log: log.clone(),
            signals: signals.clone(),
        }),
        audio: Box::new(HeadlessAudio {
            log: log.clone(),
            signals: signals.clone(),
        }),
        resources: Box::new(HeadlessResources { log: log.clone() }),
        input: Box::new(HeadlessInput {
            log: log.clone(),
            abort: abort.clone(),
            menu_keys: HashMap::new(),
        }),
        screen: Box::new(HeadlessScreen {
            log: log.clone(),
            signals: signals.clone(),
        }),
        menus: Box::new(HeadlessMenus {
            log: log.clone(),
            signals: signals.clone(),
            auto_choice: auto_menu_choice,
        }),
        special: Box::new(HeadlessSpecial { log: log.clone() }),
        signals: signals.clone(),
    };

    let handles = HeadlessHandles {
        log,
        signals,
        abort,
        fail_scenes,
    };
    (services, handles)
}

fn record(log: &EventLog, line: String) {
    debug!("engine: {}", line);
    log.borrow_mut().push(line);
}

struct HeadlessScenes {
    log: EventLog,
    stack: Vec<u32>,
    pause_depth: u32,
    fail_scenes: Rc<RefCell<HashSet<u32>>>,
}

impl SceneHost for HeadlessScenes {
    fn enter_scene(&mut self, scene_id: u32, thread_id: u32) -> bool {
        if self.fail_scenes.borrow().contains(&scene_id) {
            record(
                &self.log,
                format!("scene.enter.fail {:08X} thread {:08X}", scene_id, thread_id),
            );
            return false;
        }
        record(
            &self.log,
            format!("scene.enter {:08X} thread {:08X}", scene_id, thread_id),
        );
        self.stack.push(scene_id);
        true
    }

    fn exit_scene(&mut self, thread_id: u32) {
        let scene = self.stack.pop().unwrap_or(0);
        record(
            &self.log,
            format!("scene.exit {:08X} thread {:08X}", scene, thread_id),
        );
    }

    fn enter_pause(&mut self, thread_id: u32) {
        self.pause_depth += 1;
        record(&self.log, format!("scene.pause thread {:08X}", thread_id));
    }

    fn leave_pause(&mut self, thread_id: u32) {
        self.pause_depth = self.pause_depth.saturating_sub(1);
        record(&self.log, format!("scene.unpause thread {:08X}", thread_id));
    }

    fn current_scene(&self) -> u32 {
        self.stack.last().copied().unwrap_or(0)
    }

    fn is_scene_active(&self, scene_id: u32) -> bool {
        self.stack.contains(&scene_id)
    }

    fn active_scene_count(&self) -> usize {
        self.stack.len()
    }

    fn dump_active_scenes(&mut self, keep_scene_id: u32, thread_id: u32) {
        record(
            &self.log,
            format!(
                "scene.dump keep {:08X} thread {:08X}",
                keep_scene_id, thread_id
            ),
        );
        self.stack.retain(|&scene| scene == keep_scene_id);
    }

    fn named_point(&self, named_point_id: u32) -> Point {
        // Deterministic stand-in coordinates derived from the id
        Point::new((named_point_id & 0xFF) as i16, ((named_point_id >> 8) & 0xFF) as i16)
    }
}

struct HeadlessControl {
    log: EventLog,
    signals: SignalQueue,
    object_id: u32,
    pos: Point,
    visible: bool,
    active: bool,
}

impl HeadlessControl {
    fn record(&self, what: String) {
        record(&self.log, format!("actor.{:08X}.{}", self.object_id, what));
    }

    fn complete(&self, notify_thread_id: u32) {
        if notify_thread_id != 0 {
            self.signals
                .borrow_mut()
                .push_back(EngineSignal::Notify(notify_thread_id));
        }
    }
}

impl Control for HeadlessControl {
    fn position(&self) -> Point {
        self.pos
    }

    fn set_position(&mut self, pos: Point) {
        self.record(format!("place {},{}", pos.x, pos.y));
        self.pos = pos;
    }

    fn face(&mut self, facing: u32) {
        self.record(format!("face {}", facing));
    }

    fn start_sequence(&mut self, sequence_id: u32, notify_thread_id: u32) {
        self.record(format!("sequence {:08X}", sequence_id));
        self.complete(notify_thread_id);
    }

    fn start_move(&mut self, sequence_id: u32, dest: Point, notify_thread_id: u32) {
        self.record(format!("move {:08X} to {},{}", sequence_id, dest.x, dest.y));
        self.pos = dest;
        self.complete(notify_thread_id);
    }

    fn stop(&mut self) {
        self.record("stop".to_string());
    }

    fn appear(&mut self) {
        self.record("appear".to_string());
        self.visible = true;
    }

    fn disappear(&mut self) {
        self.record("disappear".to_string());
        self.visible = false;
    }

    fn activate(&mut self) {
        self.record("activate".to_string());
        self.active = true;
    }

    fn deactivate(&mut self) {
        self.record("deactivate".to_string());
        self.active = false;
    }

    fn set_use_pan(&mut self, use_pan: bool) {
        self.record(format!("use_pan {}", use_pan));
    }

    fn set_default_sequence(&mut self, sequence_id: u32, default_sequence_id: u32) {
        self.record(format!(
            "default_sequence {:08X} -> {:08X}",
            sequence_id, default_sequence_id
        ));
    }
}

struct HeadlessObjects {
    log: EventLog,
    signals: SignalQueue,
    controls: HashMap<u32, HeadlessControl>,
}

impl ObjectDirectory for HeadlessObjects {
    fn control(&mut self, object_id: u32) -> Option<&mut dyn Control> {
        self.controls
            .get_mut(&object_id)
            .map(|c| c as &mut dyn Control)
    }

    fn place_actor(
        &mut self,
        actor_type_id: u32,
        pos: Point,
        sequence_id: u32,
        object_id: u32,
        notify_thread_id: u32,
    ) {
        record(
            &self.log,
            format!(
                "actor.place type {:08X} object {:08X} seq {:08X} at {},{}",
                actor_type_id, object_id, sequence_id, pos.x, pos.y
            ),
        );
        let control = HeadlessControl {
            log: self.log.clone(),
            signals: self.signals.clone(),
            object_id,
            pos,
            visible: false,
            active: false,
        };
        control.complete(notify_thread_id);
        self.controls.insert(object_id, control);
    }
}

struct HeadlessCamera {
    log: EventLog,
    signals: SignalQueue,
}

impl CameraHost for HeadlessCamera {
    fn pan_center_on_object(&mut self, object_id: u32, speed: i16) {
        record(
            &self.log,
            format!("camera.center {:08X} speed {}", object_id, speed),
        );
    }

    fn pan_to_point(&mut self, pos: Point, speed: i16, notify_thread_id: u32) {
        record(
            &self.log,
            format!("camera.pan {},{} speed {}", pos.x, pos.y, speed),
        );
        if notify_thread_id != 0 {
            self.signals
                .borrow_mut()
                .push_back(EngineSignal::Notify(notify_thread_id));
        }
    }

    fn stop_pan(&mut self) {
        record(&self.log, "camera.stop".to_string());
    }
}

struct HeadlessAudio {
    log: EventLog,
    signals: SignalQueue,
}

impl AudioHost for HeadlessAudio {
    fn play_sound(&mut self, sound_id: u32, volume: i16, pan: i16) {
        record(
            &self.log,
            format!("audio.sfx {:08X} vol {} pan {}", sound_id, volume, pan),
        );
    }

    fn stop_sound(&mut self, sound_id: u32) {
        record(&self.log, format!("audio.sfx.stop {:08X}", sound_id));
    }

    fn play_music(
        &mut self,
        music_id: u32,
        kind: u32,
        volume: i16,
        pan: i16,
        notify_thread_id: u32,
    ) {
        record(
            &self.log,
            format!(
                "audio.music {:08X} kind {} vol {} pan {}",
                music_id, kind, volume, pan
            ),
        );
        if notify_thread_id != 0 {
            self.signals
                .borrow_mut()
                .push_back(EngineSignal::Notify(notify_thread_id));
        }
    }

    fn stop_music(&mut self) {
        record(&self.log, "audio.music.stop".to_string());
    }

    fn set_ui_sound(&mut self, slot: UiSoundSlot, sound_id: u32) {
        record(&self.log, format!("audio.ui {:?} {:08X}", slot, sound_id));
    }
}

struct HeadlessResources {
    log: EventLog,
}

impl ResourceHost for HeadlessResources {
    fn load(&mut self, resource_id: u32, scene_id: u32, thread_id: u32) {
        record(
            &self.log,
            format!(
                "resource.load {:08X} scene {:08X} thread {:08X}",
                resource_id, scene_id, thread_id
            ),
        );
    }

    fn unload(&mut self, resource_id: u32) {
        record(&self.log, format!("resource.unload {:08X}", resource_id));
    }
}

struct HeadlessInput {
    log: EventLog,
    abort: Rc<Cell<bool>>,
    menu_keys: HashMap<u32, u32>,
}

impl InputHost for HeadlessInput {
    fn activate_button(&mut self, button: u16) {
        record(&self.log, format!("input.button.on {:04X}", button));
    }

    fn deactivate_button(&mut self, button: u16) {
        record(&self.log, format!("input.button.off {:04X}", button));
    }

    fn discard_events(&mut self) {
        record(&self.log, "input.discard".to_string());
    }

    fn add_menu_key(&mut self, key: u32, thread_id: u32) {
        record(
            &self.log,
            format!("input.menu_key {:08X} thread {:08X}", key, thread_id),
        );
        self.menu_keys.insert(key, thread_id);
    }

    fn poll_abort(&mut self) -> bool {
        self.abort.replace(false)
    }
}

struct HeadlessScreen {
    log: EventLog,
    signals: SignalQueue,
}

impl ScreenHost for HeadlessScreen {
    fn set_display_on(&mut self, on: bool) {
        record(&self.log, format!("screen.display {}", on));
    }

    fn play_video(&mut self, video_id: u32, object_id: u32, priority: u32, notify_thread_id: u32) {
        record(
            &self.log,
            format!(
                "screen.video {:08X} object {:08X} priority {}",
                video_id, object_id, priority
            ),
        );
        if notify_thread_id != 0 {
            self.signals
                .borrow_mut()
                .push_back(EngineSignal::Notify(notify_thread_id));
        }
    }

    fn set_font(&mut self, font_id: u32) {
        record(&self.log, format!("screen.font {:08X}", font_id));
    }
}

struct HeadlessMenus {
    log: EventLog,
    signals: SignalQueue,
    auto_choice: usize,
}

impl MenuHost for HeadlessMenus {
    fn display_menu(
        &mut self,
        choices: &[MenuChoice],
        menu_id: u32,
        kind: i16,
        flags: u32,
        notify_thread_id: u32,
    ) {
        record(
            &self.log,
            format!(
                "menu.display {:08X} kind {} flags {:08X} choices {}",
                menu_id,
                kind,
                flags,
                choices.len()
            ),
        );
        let Some(choice) = choices.get(self.auto_choice.min(choices.len().saturating_sub(1)))
        else {
            return;
        };
        self.signals.borrow_mut().push_back(EngineSignal::MenuChoice {
            thread_id: notify_thread_id,
            jump_ofs: choice.jump_ofs,
        });
    }
}

struct HeadlessSpecial {
    log: EventLog,
}

impl SpecialCode for HeadlessSpecial {
    fn run(&mut self, special_code_id: u32, call: &mut OpCall) -> Result<(), String> {
        record(
            &self.log,
            format!(
                "special.run {:08X} thread {:08X}",
                special_code_id, call.thread_id
            ),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_stack() {
        let (mut services, handles) = headless_services(0);
        assert_eq!(services.scenes.current_scene(), 0);
        assert!(services.scenes.enter_scene(0x0001_0007, 1));
        assert!(services.scenes.enter_scene(0x0001_0008, 1));
        assert_eq!(services.scenes.current_scene(), 0x0001_0008);
        assert!(services.scenes.is_scene_active(0x0001_0007));
        services.scenes.exit_scene(1);
        assert_eq!(services.scenes.current_scene(), 0x0001_0007);

        handles.fail_scenes.borrow_mut().insert(0x0001_0009);
        assert!(!services.scenes.enter_scene(0x0001_0009, 1));
    }

    #[test]
    fn test_placed_actor_is_resolvable() {
        let (mut services, _handles) = headless_services(0);
        assert!(services.objects.control(0x0004_0001).is_none());
        services
            .objects
            .place_actor(0x0005_0001, Point::new(10, 20), 0x0006_0001, 0x0004_0001, 0);
        let control = services.objects.control(0x0004_0001).unwrap();
        assert_eq!(control.position(), Point::new(10, 20));
    }

    #[test]
    fn test_pan_completion_is_signalled() {
        let (mut services, handles) = headless_services(0);
        services.camera.pan_to_point(Point::new(1, 2), 4, 0x0002_0001);
        assert_eq!(
            handles.signals.borrow_mut().pop_front(),
            Some(EngineSignal::Notify(0x0002_0001))
        );
    }
}
