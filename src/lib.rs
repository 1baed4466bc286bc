pub mod config;
pub mod mouse;

pub use config::MouseConfig;
pub use mouse::{Mouse, MouseButton, MouseData, MouseError, MouseSettings};
