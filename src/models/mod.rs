pub mod entry;
pub mod template;
pub mod user;
