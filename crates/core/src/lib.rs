#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod scoring;
pub mod skills;
pub mod time;

pub use error::Error;
pub use skills::SkillGroup;
pub use time::Clock;
