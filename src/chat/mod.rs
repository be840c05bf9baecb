pub mod display;
pub mod ledger;
pub mod models;
pub mod transcript;

pub use ledger::Ledger;
pub use models::{ContextWarning, Exchange, Message, Role, UsageRecord};
pub use transcript::{Transcript, Turn};
