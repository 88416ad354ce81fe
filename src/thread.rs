use std::sync::Arc;

/// Bit 0 of the notify flags: set to suppress the caller notification
/// normally sent when a thread ends.
pub const NOTIFY_SUPPRESS: u32 = 1;

/// What a handler asks the dispatcher to do after it returns.
///
/// Exactly one outcome is produced per dispatch. `Jump` folds the relative
/// offset into the program-counter advance; the other variants end the
/// thread's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fall through to the next instruction
    Continue,
    /// Fall through, displaced by a signed byte offset relative to the
    /// end of the current instruction
    Jump(i32),
    /// Park the thread until something notifies its id
    Suspend,
    /// Give up the rest of this scheduling round, stay runnable
    Yield,
    /// Tear the thread down, notifying its caller per the notify flags
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Ready,
    Suspended,
    Terminated,
}

/// Kind-specific state carried by a thread.
pub enum ThreadKind {
    Script(ScriptTask),
    Timer(TimerTask),
    Abortable(AbortableTask),
    Talk(TalkTask),
}

/// A suspendable script execution: a program handle plus an offset into it.
pub struct ScriptTask {
    pub program: Arc<[u8]>,
    pub ip: usize,
}

/// Counts scheduler rounds down to zero, then terminates and notifies.
pub struct TimerTask {
    pub remaining: u32,
    /// Abortable timers also expire on the engine's abort signal
    pub abortable: bool,
}

/// Shepherds an inner script thread that the player may cut short.
///
/// While the inner thread runs, the shepherd yields. On the abort signal
/// it kills the inner thread and runs the abort-path code instead; either
/// way it terminates once the code it is watching finishes.
pub struct AbortableTask {
    pub program: Arc<[u8]>,
    pub inner_id: u32,
    pub abort_ip: usize,
    pub aborted: bool,
}

/// A timed talk sequence bound to an object.
///
/// Starts the pre sequence on its first turn, counts `remaining` rounds,
/// then plays the post sequence and terminates. A non-positive duration
/// means the talk runs until ended externally (voice completion notify,
/// `endTalkThreads`, or a kill).
pub struct TalkTask {
    pub object_id: u32,
    pub talk_id: u32,
    pub seq_pre: u32,
    pub seq_post: u32,
    pub named_point_id: u32,
    pub remaining: i32,
    pub started: bool,
}

/// One cooperatively scheduled thread.
pub struct Thread {
    pub id: u32,
    /// Thread to wake when this one ends (0 = nobody)
    pub caller_id: u32,
    /// Scene this thread belongs to, for scene-scoped pause and teardown
    pub scene_id: u32,
    pub notify_flags: u32,
    /// Opaque context values propagated into child threads
    pub ctx: [u32; 3],
    pub status: ThreadStatus,
    /// Nested pause depth; runnable only at zero
    pub pause_count: u32,
    /// Set when a notify arrives while the thread is not suspended, so
    /// the wakeup is not lost if it suspends afterwards
    pub notified: bool,
    pub kind: ThreadKind,
}

impl Thread {
    pub fn new(id: u32, caller_id: u32, ctx: [u32; 3], kind: ThreadKind) -> Self {
        Thread {
            id,
            caller_id,
            scene_id: 0,
            notify_flags: 0,
            ctx,
            status: ThreadStatus::Ready,
            pause_count: 0,
            notified: false,
            kind,
        }
    }

    pub fn is_runnable(&self) -> bool {
        self.status == ThreadStatus::Ready && self.pause_count == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.status == ThreadStatus::Terminated
    }

    /// Whether ending this thread should wake its caller
    pub fn notifies_caller(&self) -> bool {
        self.caller_id != 0 && self.notify_flags & NOTIFY_SUPPRESS == 0
    }
}
