//! The replicated leaderboard and the append-only chat log.

pub mod chatlog;
pub mod scoreboard;

pub use chatlog::{ChatOutcome, MessageLog, submit_chat};
pub use scoreboard::{ScoreEntry, Scoreboard, ranking_text, sorted_ranking};
