//! Domain Models - What flows through a repository call
//!
//! Entities are supplied by callers; conditions, update payloads and page
//! descriptors describe what to do with them.

pub mod condition;
pub mod entity;
pub mod page;
pub mod update;
