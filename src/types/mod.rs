//! Wire types shared between the orchestrator and the upstream provider.

mod content;
mod message;
mod response;

pub use content::{ContentPart, ImageSource, UserContent};
pub use message::{Message, Role};
pub use response::{Completion, Usage};
