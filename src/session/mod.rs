//! Session Controller: one configurable engine behind every assistant
//! surface.

pub mod controller;
pub mod events;
pub mod handle;
pub mod profile;

pub use controller::{SessionController, SessionParts};
pub use events::{NoticeKind, SessionEvent, SessionSnapshot, SessionState, VoiceStart};
pub use handle::SessionHandle;
pub use profile::{AssistantProfile, ProfileKind};
