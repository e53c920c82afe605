pub mod attempts;
pub mod badges;
pub mod coursework;
pub mod leaderboard;
pub mod outbox;
pub mod questions;
pub mod sessions;
pub mod students;
pub mod xp_events;
