//! Listing classification: the exclusion rule table, the player-name guard, and
//! release-year inference.

pub mod name_filter;
pub mod rules;
pub mod year;

pub use name_filter::title_names_player;
pub use rules::classify;
pub use year::resolve_year;
