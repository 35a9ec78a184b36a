pub mod end_state;
pub mod stage_analysis;
