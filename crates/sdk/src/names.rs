//! Default reflection target names
//!
//! These strings must match the names the host registers. The class names can
//! be overridden from `core.toml` when a host build renames them.

/// Season controller class
pub const SEASON_CHANGER_CLASS: &str = "Game.SeasonChanger";

/// `SeasonChanger::SetCurrentSeason(NewSeason: u8)`
pub const SET_CURRENT_SEASON: &str = "SetCurrentSeason";

/// World clock scheduler class (may have several live instances)
pub const SCHEDULER_CLASS: &str = "Game.Scheduler";

/// `Scheduler::AdvanceHours(InHours: i32)`
pub const ADVANCE_HOURS: &str = "AdvanceHours";
