//! Data Models
//!
//! Domain types persisted by the storage layer.

pub mod analysis;
pub mod message;
pub mod settings;

pub use analysis::{Analysis, AnalysisPhase, AnalysisStatus};
pub use message::{Message, MessageRole, MessageType, NewMessage, QuestionCategory};
pub use settings::{EngineConfig, RetentionDefaults};
