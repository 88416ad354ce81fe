use crate::thread::{
    AbortableTask, ScriptTask, TalkTask, Thread, ThreadKind, ThreadStatus, TimerTask,
};
use indexmap::IndexMap;
use log::{debug, warn};
use std::sync::Arc;

/// Generated ids (temp, timer, abortable, talk threads) live above this
/// tag so they can never collide with the code ids that name scene
/// threads.
pub const TEMP_THREAD_ID_BASE: u32 = 0x0004_0000;

/// Creates, tracks, notifies and kills script threads.
///
/// The table iterates in insertion order, which gives the scheduler a
/// deterministic round-robin. Named script threads are keyed by their
/// code id — scripts embed those ids as kill/notify targets — while all
/// other threads draw generated ids from a disjoint namespace.
pub struct ThreadManager {
    table: IndexMap<u32, Thread>,
    next_temp_id: u32,
}

impl ThreadManager {
    pub fn new() -> Self {
        ThreadManager {
            table: IndexMap::new(),
            next_temp_id: TEMP_THREAD_ID_BASE,
        }
    }

    pub fn new_temp_id(&mut self) -> u32 {
        self.next_temp_id += 1;
        self.next_temp_id
    }

    /// Start a named script thread; the code id doubles as the thread id.
    pub fn spawn_script(
        &mut self,
        thread_id: u32,
        program: Arc<[u8]>,
        caller_id: u32,
        ctx: [u32; 3],
    ) -> Result<u32, String> {
        if self.is_alive(thread_id) {
            return Err(format!(
                "Script thread {:08X} is already running",
                thread_id
            ));
        }
        debug!("spawn script thread {:08X} (caller {:08X})", thread_id, caller_id);
        self.insert(Thread::new(
            thread_id,
            caller_id,
            ctx,
            ThreadKind::Script(ScriptTask { program, ip: 0 }),
        ));
        Ok(thread_id)
    }

    /// Start an anonymous script thread at an arbitrary code offset.
    pub fn spawn_temp_script(
        &mut self,
        program: Arc<[u8]>,
        ip: usize,
        caller_id: u32,
        ctx: [u32; 3],
    ) -> u32 {
        let id = self.new_temp_id();
        debug!("spawn temp script thread {:08X} at {:#x}", id, ip);
        self.insert(Thread::new(
            id,
            caller_id,
            ctx,
            ThreadKind::Script(ScriptTask { program, ip }),
        ));
        id
    }

    pub fn spawn_timer(&mut self, duration: u32, abortable: bool, caller_id: u32) -> u32 {
        let id = self.new_temp_id();
        debug!(
            "spawn timer thread {:08X} for {} ticks (caller {:08X})",
            id, duration, caller_id
        );
        self.insert(Thread::new(
            id,
            caller_id,
            [0, 0, 0],
            ThreadKind::Timer(TimerTask {
                remaining: duration,
                abortable,
            }),
        ));
        id
    }

    /// Start an abortable pair: a shepherd thread plus the inner temp
    /// script thread it watches. Returns the shepherd's id.
    pub fn spawn_abortable(
        &mut self,
        program: Arc<[u8]>,
        ip: usize,
        abort_ip: usize,
        caller_id: u32,
    ) -> u32 {
        let shepherd_id = self.new_temp_id();
        let inner_id = self.spawn_temp_script(program.clone(), ip, shepherd_id, [0, 0, 0]);
        debug!(
            "spawn abortable thread {:08X} (inner {:08X}, abort at {:#x})",
            shepherd_id, inner_id, abort_ip
        );
        self.insert(Thread::new(
            shepherd_id,
            caller_id,
            [0, 0, 0],
            ThreadKind::Abortable(AbortableTask {
                program,
                inner_id,
                abort_ip,
                aborted: false,
            }),
        ));
        shepherd_id
    }

    pub fn spawn_talk(
        &mut self,
        duration: i16,
        object_id: u32,
        talk_id: u32,
        seq_pre: u32,
        seq_post: u32,
        named_point_id: u32,
        caller_id: u32,
        scene_id: u32,
    ) -> u32 {
        let id = self.new_temp_id();
        debug!(
            "spawn talk thread {:08X} on object {:08X} for {} ticks",
            id, object_id, duration
        );
        let mut thread = Thread::new(
            id,
            caller_id,
            [0, 0, 0],
            ThreadKind::Talk(TalkTask {
                object_id,
                talk_id,
                seq_pre,
                seq_post,
                named_point_id,
                remaining: duration as i32,
                started: false,
            }),
        );
        thread.scene_id = scene_id;
        self.insert(thread);
        id
    }

    fn insert(&mut self, thread: Thread) {
        self.table.insert(thread.id, thread);
    }

    pub fn find(&self, thread_id: u32) -> Option<&Thread> {
        self.table.get(&thread_id).filter(|t| !t.is_terminated())
    }

    pub fn find_mut(&mut self, thread_id: u32) -> Option<&mut Thread> {
        self.table
            .get_mut(&thread_id)
            .filter(|t| !t.is_terminated())
    }

    pub fn is_alive(&self, thread_id: u32) -> bool {
        self.find(thread_id).is_some()
    }

    pub fn is_runnable(&self, thread_id: u32) -> bool {
        self.find(thread_id).map_or(false, |t| t.is_runnable())
    }

    /// Wake a suspended thread, or record the notify for a thread that
    /// has not suspended yet so the wakeup is not lost.
    pub fn notify(&mut self, thread_id: u32) {
        if thread_id == 0 {
            return;
        }
        match self.find_mut(thread_id) {
            Some(thread) => match thread.status {
                ThreadStatus::Suspended => {
                    debug!("notify wakes thread {:08X}", thread_id);
                    thread.status = ThreadStatus::Ready;
                }
                ThreadStatus::Ready => {
                    debug!("notify recorded for running thread {:08X}", thread_id);
                    thread.notified = true;
                }
                ThreadStatus::Terminated => {}
            },
            None => debug!("notify for unknown thread {:08X}", thread_id),
        }
    }

    /// Park a thread; a notify that already arrived is consumed instead.
    pub fn suspend(&mut self, thread_id: u32) {
        if let Some(thread) = self.find_mut(thread_id) {
            if thread.notified {
                thread.notified = false;
            } else {
                thread.status = ThreadStatus::Suspended;
            }
        }
    }

    /// End a thread, waking its caller unless the notify flags say not to.
    pub fn terminate(&mut self, thread_id: u32) {
        let Some(thread) = self.find_mut(thread_id) else {
            return;
        };
        thread.status = ThreadStatus::Terminated;
        let caller = if thread.notifies_caller() {
            thread.caller_id
        } else {
            0
        };
        debug!("terminate thread {:08X} (notify {:08X})", thread_id, caller);
        if caller != 0 {
            self.notify(caller);
        }
    }

    /// Kill a thread by id. Same notification contract as a normal
    /// termination, so no caller is left blocked forever.
    pub fn kill(&mut self, thread_id: u32) {
        if self.is_alive(thread_id) {
            debug!("kill thread {:08X}", thread_id);
            self.terminate(thread_id);
        } else {
            warn!("kill for unknown thread {:08X}", thread_id);
        }
    }

    /// Mass-terminate, used on game reset. The excepted thread (the one
    /// running the reset opcode) survives.
    pub fn terminate_all_except(&mut self, except_id: u32) {
        let ids: Vec<u32> = self.table.keys().copied().collect();
        for id in ids {
            if id != except_id {
                self.terminate(id);
            }
        }
    }

    pub fn set_thread_scene(&mut self, thread_id: u32, scene_id: u32) {
        if let Some(thread) = self.find_mut(thread_id) {
            thread.scene_id = scene_id;
        }
    }

    pub fn pause_by_scene(&mut self, scene_id: u32) {
        for thread in self.table.values_mut() {
            if thread.scene_id == scene_id && !thread.is_terminated() {
                thread.pause_count += 1;
            }
        }
    }

    pub fn unpause_by_scene(&mut self, scene_id: u32) {
        for thread in self.table.values_mut() {
            if thread.scene_id == scene_id && thread.pause_count > 0 {
                thread.pause_count -= 1;
            }
        }
    }

    /// Ids of all live talk threads, for `endTalkThreads`
    pub fn talk_ids(&self) -> Vec<u32> {
        self.table
            .values()
            .filter(|t| !t.is_terminated() && matches!(t.kind, ThreadKind::Talk(_)))
            .map(|t| t.id)
            .collect()
    }

    /// Snapshot of live thread ids in scheduling order
    pub fn live_ids(&self) -> Vec<u32> {
        self.table
            .values()
            .filter(|t| !t.is_terminated())
            .map(|t| t.id)
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.table.values().filter(|t| !t.is_terminated()).count()
    }

    pub fn runnable_count(&self) -> usize {
        self.table.values().filter(|t| t.is_runnable()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Drop terminated threads from the table. Deferred to the end of a
    /// round so ids stay resolvable while notifications settle.
    pub fn reap(&mut self) {
        self.table.retain(|_, t| !t.is_terminated());
    }
}

impl Default for ThreadManager {
    fn default() -> Self {
        Self::new()
    }
}
