//! Marquee - now-playing metadata enrichment
//!
//! This library crate exposes the provider caches, identifier resolution and
//! cast merging used by the `marquee` binary.

pub mod cache;
pub mod config;
pub mod metadata;
