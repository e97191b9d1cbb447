//! Node classification: visibility gate and interaction type.

mod kind;
mod visibility;

pub use kind::{classify, matching_rule, InteractionType, Rule, RULES};
pub use visibility::is_visible;
