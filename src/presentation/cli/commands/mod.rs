pub mod alerts;
pub mod daemon;
pub mod discover;
pub mod poll;
pub mod status;
