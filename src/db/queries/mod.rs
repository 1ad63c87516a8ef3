pub mod mute_target;
