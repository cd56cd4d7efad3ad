pub mod autoplay;
pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod note;
pub mod scores;
pub mod stage_stats;
pub mod timing_windows;
