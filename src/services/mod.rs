pub mod language_model;
pub mod version_control;

pub use language_model::{ChatMessage, Conversation, LanguageModelService};
pub use version_control::{LogQuery, VersionControlService};
