//! Mapping resolution and suggestion.

mod resolver;
mod suggest;

pub use resolver::{resolve, MappingRole, ResolvedMapping};
pub use suggest::{suggest, MappingSuggestion, SuggestedField};
