pub mod answers;
pub mod compose;
pub mod condition;
pub mod context;
pub mod conversation;
pub mod fallback;
pub mod renderer;
pub mod sanitize;
pub mod submission;
pub mod tags;
pub mod templates;
