//! Actor/object manipulation and audio opcodes.
//!
//! Most handlers resolve the object id and trust the result — an
//! unresolved id is a script error. The two documented exceptions are
//! `appearActor`, which places a stand-in actor when the object has no
//! control yet, and `activateObject`, which quietly does nothing.

use crate::instruction::OpCall;
use crate::interpreter::Interpreter;
use crate::opcode_tables::{opcode_name, Opcode};
use crate::thread::Outcome;
use crate::util::calc_point_direction;
use crate::engine::UiSoundSlot;

// Stand-in actor used when appearActor finds no control for the object.
const FALLBACK_ACTOR_TYPE_ID: u32 = 0x0005_0001;
const FALLBACK_SEQUENCE_ID: u32 = 0x0006_0001;
const FALLBACK_NAMED_POINT_ID: u32 = 0x0007_0023;

pub fn is_actor_op(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::PlaceActor
            | Opcode::FaceActor
            | Opcode::FaceActorToObject
            | Opcode::StartSequenceActor
            | Opcode::StartMoveActor
            | Opcode::SetActorToNamedPoint
            | Opcode::AppearActor
            | Opcode::DisappearActor
            | Opcode::ActivateObject
            | Opcode::DeactivateObject
            | Opcode::SetDefaultSequence
            | Opcode::StopActor
            | Opcode::SetActorUsePan
            | Opcode::StartSound
            | Opcode::StopSound
            | Opcode::StartMusic
            | Opcode::StopMusic
            | Opcode::SetSelectSfx
            | Opcode::SetMoveSfx
            | Opcode::SetDenySfx
            | Opcode::SetAdjustUpSfx
            | Opcode::SetAdjustDnSfx
    )
}

impl Interpreter {
    pub fn execute_actor_op(
        &mut self,
        opcode: Opcode,
        call: &mut OpCall,
    ) -> Result<Outcome, String> {
        match opcode {
            Opcode::PlaceActor => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                let actor_type_id = call.read_u32()?;
                let sequence_id = call.read_u32()?;
                let named_point_id = call.read_u32()?;
                let pos = self.engine.scenes.named_point(named_point_id);
                self.engine.objects.place_actor(
                    actor_type_id,
                    pos,
                    sequence_id,
                    object_id,
                    call.thread_id,
                );
                Ok(Outcome::Continue)
            }

            Opcode::FaceActor => {
                let facing = call.read_i16()?;
                let object_id = call.read_u32()?;
                self.control_for(object_id)?.face(facing as u32);
                Ok(Outcome::Continue)
            }

            // Facing is computed from the relative positions; coincident
            // objects leave the facing unchanged
            Opcode::FaceActorToObject => {
                call.skip(2)?;
                let object_id1 = call.read_u32()?;
                let object_id2 = call.read_u32()?;
                let pos1 = self.control_for(object_id1)?.position();
                let pos2 = self.control_for(object_id2)?.position();
                if let Some(facing) = calc_point_direction(pos1, pos2) {
                    self.control_for(object_id1)?.face(facing);
                }
                Ok(Outcome::Continue)
            }

            Opcode::StartSequenceActor => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                let sequence_id = call.read_u32()?;
                let notify = call.thread_id;
                self.control_for(object_id)?
                    .start_sequence(sequence_id, notify);
                Ok(Outcome::Continue)
            }

            Opcode::StartMoveActor => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                let sequence_id = call.read_u32()?;
                let named_point_id = call.read_u32()?;
                let dest = self.engine.scenes.named_point(named_point_id);
                let notify = call.thread_id;
                self.control_for(object_id)?
                    .start_move(sequence_id, dest, notify);
                Ok(Outcome::Continue)
            }

            // Also halts any motion in progress before teleporting
            Opcode::SetActorToNamedPoint => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                let named_point_id = call.read_u32()?;
                let pos = self.engine.scenes.named_point(named_point_id);
                let control = self.control_for(object_id)?;
                control.stop();
                control.set_position(pos);
                Ok(Outcome::Continue)
            }

            Opcode::AppearActor => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                if self.engine.objects.control(object_id).is_none() {
                    let pos = self.engine.scenes.named_point(FALLBACK_NAMED_POINT_ID);
                    self.engine.objects.place_actor(
                        FALLBACK_ACTOR_TYPE_ID,
                        pos,
                        FALLBACK_SEQUENCE_ID,
                        object_id,
                        0,
                    );
                    self.control_for(object_id)?
                        .start_sequence(FALLBACK_SEQUENCE_ID, 0);
                }
                self.control_for(object_id)?.appear();
                Ok(Outcome::Continue)
            }

            Opcode::DisappearActor => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                self.control_for(object_id)?.disappear();
                Ok(Outcome::Continue)
            }

            // Unresolved ids are a no-op here, unlike the other control
            // opcodes
            Opcode::ActivateObject => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                if let Some(control) = self.engine.objects.control(object_id) {
                    control.activate();
                }
                Ok(Outcome::Continue)
            }

            Opcode::DeactivateObject => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                self.control_for(object_id)?.deactivate();
                Ok(Outcome::Continue)
            }

            Opcode::SetDefaultSequence => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                let default_sequence_id = call.read_u32()?;
                let sequence_id = call.read_u32()?;
                self.control_for(object_id)?
                    .set_default_sequence(sequence_id, default_sequence_id);
                Ok(Outcome::Continue)
            }

            Opcode::StopActor => {
                call.skip(2)?;
                let object_id = call.read_u32()?;
                self.control_for(object_id)?.stop();
                Ok(Outcome::Continue)
            }

            Opcode::SetActorUsePan => {
                let use_pan = call.read_i16()?;
                let object_id = call.read_u32()?;
                self.control_for(object_id)?.set_use_pan(use_pan != 0);
                Ok(Outcome::Continue)
            }

            Opcode::StartSound => {
                call.skip(2)?;
                let volume = call.read_i16()?;
                let pan = call.read_i16()?;
                let sound_id = call.read_u32()?;
                self.engine.audio.play_sound(sound_id, volume, pan);
                Ok(Outcome::Continue)
            }

            Opcode::StopSound => {
                call.skip(2)?;
                let sound_id = call.read_u32()?;
                self.engine.audio.stop_sound(sound_id);
                Ok(Outcome::Continue)
            }

            Opcode::StartMusic => {
                call.skip(2)?;
                let volume = call.read_i16()?;
                let pan = call.read_i16()?;
                let music_id = call.read_u32()?;
                let kind = call.read_u32()?;
                self.engine
                    .audio
                    .play_music(music_id, kind, volume, pan, call.thread_id);
                Ok(Outcome::Continue)
            }

            Opcode::StopMusic => {
                self.engine.audio.stop_music();
                Ok(Outcome::Continue)
            }

            Opcode::SetSelectSfx => self.set_ui_sound(UiSoundSlot::Select, call),
            Opcode::SetMoveSfx => self.set_ui_sound(UiSoundSlot::Move, call),
            Opcode::SetDenySfx => self.set_ui_sound(UiSoundSlot::Deny, call),
            Opcode::SetAdjustUpSfx => self.set_ui_sound(UiSoundSlot::AdjustUp, call),
            Opcode::SetAdjustDnSfx => self.set_ui_sound(UiSoundSlot::AdjustDown, call),

            _ => Err(format!(
                "Opcode {} is not an actor operation",
                opcode_name(opcode)
            )),
        }
    }

    fn set_ui_sound(&mut self, slot: UiSoundSlot, call: &mut OpCall) -> Result<Outcome, String> {
        call.skip(2)?;
        let sound_id = call.read_u32()?;
        self.engine.audio.set_ui_sound(slot, sound_id);
        Ok(Outcome::Continue)
    }
}
