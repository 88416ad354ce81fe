//! Collaborator interfaces the script core drives.
//!
//! The core never owns scenes, actors, the camera or the mixer; it
//! reaches them through the narrow traits below, collected in
//! [`EngineServices`]. Anything asynchronous on the engine side (a pan
//! arriving, music finishing, a menu choice being made, the abort key)
//! flows back through the shared [`SignalQueue`], which the scheduler
//! drains at the start of every round.

use crate::instruction::OpCall;
use crate::util::Point;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Completions and wakeups produced by engine services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    /// Wake the thread with this id
    Notify(u32),
    /// A menu choice was made: record the jump offset, then wake the
    /// thread that asked for the menu
    MenuChoice { thread_id: u32, jump_ofs: i16 },
}

pub type SignalQueue = Rc<RefCell<VecDeque<EngineSignal>>>;

pub fn new_signal_queue() -> SignalQueue {
    Rc::new(RefCell::new(VecDeque::new()))
}

/// One menu entry as collected off the script stack: the jump offset the
/// choice maps to, and the end marker that told the pop loop to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuChoice {
    pub jump_ofs: i16,
    pub end_marker: i16,
}

/// UI feedback sound-effect slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiSoundSlot {
    Select,
    Move,
    Deny,
    AdjustUp,
    AdjustDown,
}

/// Scene stack owned by the engine: entering, leaving, pausing, and the
/// named points a scene's resources define.
pub trait SceneHost {
    /// Enter a scene on behalf of a thread. `false` means the scene
    /// could not be brought up (resource failure); the calling thread
    /// terminates rather than crashing.
    fn enter_scene(&mut self, scene_id: u32, thread_id: u32) -> bool;
    fn exit_scene(&mut self, thread_id: u32);
    /// Freeze the presentation of the current scene (modal/close-up entry)
    fn enter_pause(&mut self, thread_id: u32);
    fn leave_pause(&mut self, thread_id: u32);
    fn current_scene(&self) -> u32;
    fn is_scene_active(&self, scene_id: u32) -> bool;
    fn active_scene_count(&self) -> usize;
    /// Tear active scenes down to the given backdrop scene
    fn dump_active_scenes(&mut self, keep_scene_id: u32, thread_id: u32);
    fn named_point(&self, named_point_id: u32) -> Point;
}

/// A live actor or object's mutable runtime state.
pub trait Control {
    fn position(&self) -> Point;
    fn set_position(&mut self, pos: Point);
    fn face(&mut self, facing: u32);
    fn start_sequence(&mut self, sequence_id: u32, notify_thread_id: u32);
    fn start_move(&mut self, sequence_id: u32, dest: Point, notify_thread_id: u32);
    fn stop(&mut self);
    fn appear(&mut self);
    fn disappear(&mut self);
    fn activate(&mut self);
    fn deactivate(&mut self);
    fn set_use_pan(&mut self, use_pan: bool);
    fn set_default_sequence(&mut self, sequence_id: u32, default_sequence_id: u32);
}

/// Resolves object ids to live controls.
pub trait ObjectDirectory {
    fn control(&mut self, object_id: u32) -> Option<&mut dyn Control>;
    fn place_actor(
        &mut self,
        actor_type_id: u32,
        pos: Point,
        sequence_id: u32,
        object_id: u32,
        notify_thread_id: u32,
    );
}

/// Camera pans are requests; completion comes back as a Notify signal.
pub trait CameraHost {
    fn pan_center_on_object(&mut self, object_id: u32, speed: i16);
    fn pan_to_point(&mut self, pos: Point, speed: i16, notify_thread_id: u32);
    fn stop_pan(&mut self);
}

pub trait AudioHost {
    fn play_sound(&mut self, sound_id: u32, volume: i16, pan: i16);
    fn stop_sound(&mut self, sound_id: u32);
    fn play_music(&mut self, music_id: u32, kind: u32, volume: i16, pan: i16, notify_thread_id: u32);
    fn stop_music(&mut self);
    fn set_ui_sound(&mut self, slot: UiSoundSlot, sound_id: u32);
}

pub trait ResourceHost {
    fn load(&mut self, resource_id: u32, scene_id: u32, thread_id: u32);
    fn unload(&mut self, resource_id: u32);
}

pub trait InputHost {
    fn activate_button(&mut self, button: u16);
    fn deactivate_button(&mut self, button: u16);
    fn discard_events(&mut self);
    fn add_menu_key(&mut self, key: u32, thread_id: u32);
    /// Poll-and-consume the abort signal watched by abortable threads
    fn poll_abort(&mut self) -> bool;
}

pub trait ScreenHost {
    fn set_display_on(&mut self, on: bool);
    fn play_video(&mut self, video_id: u32, object_id: u32, priority: u32, notify_thread_id: u32);
    fn set_font(&mut self, font_id: u32);
}

/// Presents a menu; the choice arrives later as a MenuChoice signal
/// addressed to `notify_thread_id`.
pub trait MenuHost {
    fn display_menu(
        &mut self,
        choices: &[MenuChoice],
        menu_id: u32,
        kind: i16,
        flags: u32,
        notify_thread_id: u32,
    );
}

/// Game-specific native routines: a secondary dispatch opaque to the core.
pub trait SpecialCode {
    fn run(&mut self, special_code_id: u32, call: &mut OpCall) -> Result<(), String>;
}

/// The capability set handed to opcode handlers.
pub struct EngineServices {
    pub scenes: Box<dyn SceneHost>,
    pub objects: Box<dyn ObjectDirectory>,
    pub camera: Box<dyn CameraHost>,
    pub audio: Box<dyn AudioHost>,
    pub resources: Box<dyn ResourceHost>,
    pub input: Box<dyn InputHost>,
    pub screen: Box<dyn ScreenHost>,
    pub menus: Box<dyn MenuHost>,
    pub special: Box<dyn SpecialCode>,
    pub signals: SignalQueue,
}
