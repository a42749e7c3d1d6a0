//! Core data model.

pub mod broadcast;
pub mod message;
pub mod work;
