use crate::detection::infrastructure::detector_loader::DetectorLoadMessage;
use crate::session::frame_scheduler::CallbackId;

/// User intents, as issued by buttons or keys in the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleCamera,
    ToggleBlur,
    ToggleRecording,
    Snapshot,
    Quit,
}

impl Command {
    /// Single-key bindings used by the terminal front end.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "c" => Some(Self::ToggleCamera),
            "b" => Some(Self::ToggleBlur),
            "r" => Some(Self::ToggleRecording),
            "s" => Some(Self::Snapshot),
            "q" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Everything the session reacts to, delivered on one timeline.
#[derive(Debug)]
pub enum AppEvent {
    Detector(DetectorLoadMessage),
    Command(Command),
    /// The display is ready for the callback requested under this id.
    Refresh(CallbackId),
    DisplayResized(u32, u32),
}
