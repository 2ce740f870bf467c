//! Trait definitions for swappable components

pub mod cache;
