pub mod dependencies;
pub mod details;
pub mod log;
pub mod prefix;
