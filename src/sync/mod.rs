// src/sync/mod.rs

//! Skill synchronization: seeds the watch set from a list of skill names and
//! maps change events onto the local mirror.

pub mod handler;
pub mod orchestrator;

pub use handler::MirrorHandler;
pub use orchestrator::{discover_skills, SeedOutcome, SkillSyncer};
