pub mod attendance;
pub mod common;
pub mod note;
pub mod session;
pub mod sync;
