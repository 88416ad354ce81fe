/// Script opcodes, one variant per registered slot.
///
/// The numbering is part of the script format: compiled scripts embed
/// these byte values, so the table below registers each opcode at its
/// wire number. Slots left out of the table are reachable from bad data
/// and fail fast at dispatch rather than being decoded as anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Suspend,
    Yield,
    Terminate,
    Jump,
    StartScriptThread,
    StartTempScriptThread,
    StartTimerThread,
    NotifyCaller,
    SetThreadSceneId,
    EndTalkThreads,
    LoadResource,
    UnloadResource,
    EnterScene,
    ChangeScene,
    StartModalScene,
    ExitModalScene,
    EnterCloseUpScene,
    ExitCloseUpScene,
    PanCenterObject,
    PanToObject,
    PanToNamedPoint,
    PanToPoint,
    PanStop,
    SetDisplay,
    IncBlockCounter,
    ClearBlockCounter,
    SetProperty,
    PlaceActor,
    FaceActor,
    FaceActorToObject,
    StartSequenceActor,
    StartMoveActor,
    SetActorToNamedPoint,
    StartTalkThread,
    AppearActor,
    DisappearActor,
    ActivateObject,
    DeactivateObject,
    SetDefaultSequence,
    SetSelectSfx,
    SetMoveSfx,
    SetDenySfx,
    SetAdjustUpSfx,
    SetAdjustDnSfx,
    StartSound,
    StopSound,
    StartMusic,
    StopMusic,
    StackPushRandom,
    IfLte,
    AddMenuChoice,
    DisplayMenu,
    SwitchMenuChoice,
    ResetGame,
    DeactivateButton,
    ActivateButton,
    JumpIf,
    IsPrevSceneId,
    IsCurrentSceneId,
    IsActiveSceneId,
    Not,
    And,
    Or,
    GetProperty,
    CompareBlockCounter,
    DebugPrint,
    PlayVideo,
    StackPop,
    StackDup,
    LoadSpecialCodeModule,
    RunSpecialCode,
    StopActor,
    SetActorUsePan,
    StartAbortableThread,
    KillThread,
    SetSceneIdThreadId,
    StackPush0,
    SetFontId,
    AddMenuKey,
    ChangeSceneAll,
}

/// Wire registrations: (opcode byte, opcode). Gaps are intentional —
/// unassigned bytes are an error at dispatch time.
const REGISTRATIONS: &[(u8, Opcode)] = &[
    (2, Opcode::Suspend),
    (3, Opcode::Yield),
    (4, Opcode::Terminate),
    (5, Opcode::Jump),
    (6, Opcode::StartScriptThread),
    (8, Opcode::StartTempScriptThread),
    (9, Opcode::StartTimerThread),
    (12, Opcode::NotifyCaller),
    (14, Opcode::SetThreadSceneId),
    (15, Opcode::EndTalkThreads),
    (16, Opcode::LoadResource),
    (17, Opcode::UnloadResource),
    (20, Opcode::EnterScene),
    (25, Opcode::ChangeScene),
    (26, Opcode::StartModalScene),
    (27, Opcode::ExitModalScene),
    (30, Opcode::EnterCloseUpScene),
    (31, Opcode::ExitCloseUpScene),
    (32, Opcode::PanCenterObject),
    (34, Opcode::PanToObject),
    (35, Opcode::PanToNamedPoint),
    (36, Opcode::PanToPoint),
    (37, Opcode::PanStop),
    (39, Opcode::SetDisplay),
    (42, Opcode::IncBlockCounter),
    (43, Opcode::ClearBlockCounter),
    (45, Opcode::SetProperty),
    (46, Opcode::PlaceActor),
    (47, Opcode::FaceActor),
    (48, Opcode::FaceActorToObject),
    (49, Opcode::StartSequenceActor),
    (51, Opcode::StartMoveActor),
    (53, Opcode::SetActorToNamedPoint),
    (56, Opcode::StartTalkThread),
    (57, Opcode::AppearActor),
    (58, Opcode::DisappearActor),
    (60, Opcode::ActivateObject),
    (61, Opcode::DeactivateObject),
    (62, Opcode::SetDefaultSequence),
    (63, Opcode::SetSelectSfx),
    (64, Opcode::SetMoveSfx),
    (65, Opcode::SetDenySfx),
    (66, Opcode::SetAdjustUpSfx),
    (67, Opcode::SetAdjustDnSfx),
    (71, Opcode::StartSound),
    (74, Opcode::StopSound),
    (75, Opcode::StartMusic),
    (76, Opcode::StopMusic),
    (78, Opcode::StackPushRandom),
    (79, Opcode::IfLte),
    (80, Opcode::AddMenuChoice),
    (81, Opcode::DisplayMenu),
    (82, Opcode::SwitchMenuChoice),
    (84, Opcode::ResetGame),
    (87, Opcode::DeactivateButton),
    (88, Opcode::ActivateButton),
    (103, Opcode::JumpIf),
    (104, Opcode::IsPrevSceneId),
    (105, Opcode::IsCurrentSceneId),
    (106, Opcode::IsActiveSceneId),
    (107, Opcode::Not),
    (108, Opcode::And),
    (109, Opcode::Or),
    (110, Opcode::GetProperty),
    (111, Opcode::CompareBlockCounter),
    (126, Opcode::DebugPrint),
    (144, Opcode::PlayVideo),
    (146, Opcode::StackPop),
    (147, Opcode::StackDup),
    (148, Opcode::LoadSpecialCodeModule),
    (150, Opcode::RunSpecialCode),
    (160, Opcode::StopActor),
    (161, Opcode::SetActorUsePan),
    (168, Opcode::StartAbortableThread),
    (169, Opcode::KillThread),
    (175, Opcode::SetSceneIdThreadId),
    (176, Opcode::StackPush0),
    (177, Opcode::SetFontId),
    (178, Opcode::AddMenuKey),
    (179, Opcode::ChangeSceneAll),
];

lazy_static! {
    /// 256-slot dispatch table, built once. Every slot starts empty and
    /// only the registrations above fill one in.
    static ref OPCODE_TABLE: [Option<Opcode>; 256] = {
        let mut table = [None; 256];
        for &(byte, op) in REGISTRATIONS {
            table[byte as usize] = Some(op);
        }
        table
    };
}

/// Look up the opcode registered for a byte, if any
pub fn opcode_from_byte(byte: u8) -> Option<Opcode> {
    OPCODE_TABLE[byte as usize]
}

/// Debug name used in traces and error messages
pub fn opcode_name(op: Opcode) -> &'static str {
    match op {
        Opcode::Suspend => "suspend",
        Opcode::Yield => "yield",
        Opcode::Terminate => "terminate",
        Opcode::Jump => "jump",
        Opcode::StartScriptThread => "startScriptThread",
        Opcode::StartTempScriptThread => "startTempScriptThread",
        Opcode::StartTimerThread => "startTimerThread",
        Opcode::NotifyCaller => "notifyCaller",
        Opcode::SetThreadSceneId => "setThreadSceneId",
        Opcode::EndTalkThreads => "endTalkThreads",
        Opcode::LoadResource => "loadResource",
        Opcode::UnloadResource => "unloadResource",
        Opcode::EnterScene => "enterScene",
        Opcode::ChangeScene => "changeScene",
        Opcode::StartModalScene => "startModalScene",
        Opcode::ExitModalScene => "exitModalScene",
        Opcode::EnterCloseUpScene => "enterCloseUpScene",
        Opcode::ExitCloseUpScene => "exitCloseUpScene",
        Opcode::PanCenterObject => "panCenterObject",
        Opcode::PanToObject => "panToObject",
        Opcode::PanToNamedPoint => "panToNamedPoint",
        Opcode::PanToPoint => "panToPoint",
        Opcode::PanStop => "panStop",
        Opcode::SetDisplay => "setDisplay",
        Opcode::IncBlockCounter => "incBlockCounter",
        Opcode::ClearBlockCounter => "clearBlockCounter",
        Opcode::SetProperty => "setProperty",
        Opcode::PlaceActor => "placeActor",
        Opcode::FaceActor => "faceActor",
        Opcode::FaceActorToObject => "faceActorToObject",
        Opcode::StartSequenceActor => "startSequenceActor",
        Opcode::StartMoveActor => "startMoveActor",
        Opcode::SetActorToNamedPoint => "setActorToNamedPoint",
        Opcode::StartTalkThread => "startTalkThread",
        Opcode::AppearActor => "appearActor",
        Opcode::DisappearActor => "disappearActor",
        Opcode::ActivateObject => "activateObject",
        Opcode::DeactivateObject => "deactivateObject",
        Opcode::SetDefaultSequence => "setDefaultSequence",
        Opcode::SetSelectSfx => "setSelectSfx",
        Opcode::SetMoveSfx => "setMoveSfx",
        Opcode::SetDenySfx => "setDenySfx",
        Opcode::SetAdjustUpSfx => "setAdjustUpSfx",
        Opcode::SetAdjustDnSfx => "setAdjustDnSfx",
        Opcode::StartSound => "startSound",
        Opcode::StopSound => "stopSound",
        Opcode::StartMusic => "startMusic",
        Opcode::StopMusic => "stopMusic",
        Opcode::StackPushRandom => "stackPushRandom",
        Opcode::IfLte => "ifLte",
        Opcode::AddMenuChoice => "addMenuChoice",
        Opcode::DisplayMenu => "displayMenu",
        Opcode::SwitchMenuChoice => "switchMenuChoice",
        Opcode::ResetGame => "resetGame",
        Opcode::DeactivateButton => "deactivateButton",
        Opcode::ActivateButton => "activateButton",
        Opcode::JumpIf => "jumpIf",
        Opcode::IsPrevSceneId => "isPrevSceneId",
        Opcode::IsCurrentSceneId => "isCurrentSceneId",
        Opcode::IsActiveSceneId => "isActiveSceneId",
        Opcode::Not => "not",
        Opcode::And => "and",
        Opcode::Or => "or",
        Opcode::GetProperty => "getProperty",
        Opcode::CompareBlockCounter => "compareBlockCounter",
        Opcode::DebugPrint => "debugPrint",
        Opcode::PlayVideo => "playVideo",
        Opcode::StackPop => "stackPop",
        Opcode::StackDup => "stackDup",
        Opcode::LoadSpecialCodeModule => "loadSpecialCodeModule",
        Opcode::RunSpecialCode => "runSpecialCode",
        Opcode::StopActor => "stopActor",
        Opcode::SetActorUsePan => "setActorUsePan",
        Opcode::StartAbortableThread => "startAbortableThread",
        Opcode::KillThread => "killThread",
        Opcode::SetSceneIdThreadId => "setSceneIdThreadId",
        Opcode::StackPush0 => "stackPush0",
        Opcode::SetFontId => "setFontId",
        Opcode::AddMenuKey => "addMenuKey",
        Opcode::ChangeSceneAll => "changeSceneAll",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_bytes_resolve() {
        assert_eq!(opcode_from_byte(2), Some(Opcode::Suspend));
        assert_eq!(opcode_from_byte(79), Some(Opcode::IfLte));
        assert_eq!(opcode_from_byte(179), Some(Opcode::ChangeSceneAll));
    }

    #[test]
    fn test_unassigned_bytes_are_none() {
        assert_eq!(opcode_from_byte(0), None);
        assert_eq!(opcode_from_byte(1), None);
        assert_eq!(opcode_from_byte(7), None);
        assert_eq!(opcode_from_byte(255), None);
    }

    #[test]
    fn test_registrations_have_no_duplicates() {
        let mut seen = [false; 256];
        for &(byte, _) in REGISTRATIONS {
            assert!(!seen[byte as usize], "duplicate registration {}", byte);
            seen[byte as usize] = true;
        }
    }
}
