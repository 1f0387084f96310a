pub mod adb_screencap;
pub mod frame;
pub mod frame_source;
pub mod traits;
pub mod types;
