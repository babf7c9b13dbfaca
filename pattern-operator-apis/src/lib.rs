mod application;
mod pattern;
mod subscription;

pub use application::*;
pub use pattern::*;
pub use subscription::*;
