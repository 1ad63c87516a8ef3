mod mute_target;
mod timestamp;

pub use mute_target::{MuteKind, MuteStatus, MuteTarget, MuteTargetRow};
pub use timestamp::{Timestamp, TIMESTAMP_FORMAT};
