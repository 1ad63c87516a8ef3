pub mod duration;
pub mod formatting;
pub mod key_locks;
