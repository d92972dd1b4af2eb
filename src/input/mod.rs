pub mod backend;
pub mod recording;

pub use backend::{DryRunBackend, InputBackend, InputError};
pub use recording::{InputEvent, InputLog, RecordingBackend};
