pub mod activity;
pub mod message;

pub use activity::*;
pub use message::*;
