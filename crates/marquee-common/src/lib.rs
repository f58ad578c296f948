//! Marquee-Common: Shared types and errors.
//!
//! This crate provides the vocabulary shared by the enrichment pipeline and its
//! callers:
//!
//! - **Typed IDs**: [`ItemId`], the identity a playback item is tracked under
//! - **External ids**: [`ExternalIds`], the imdb / tvdb / tmdb triple
//! - **Items**: [`MediaItem`] and its owned [`Role`] list
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use marquee_common::{ExternalIds, MediaItem, MediaKind};
//!
//! let mut item = MediaItem::movie("Heat", 1995);
//! item.external_ids.imdb = Some("tt0113277".into());
//!
//! assert_eq!(item.kind, MediaKind::Movie);
//! assert!(item.external_ids.has_imdb());
//! assert_eq!(ExternalIds::default().tmdb, None);
//! ```

pub mod error;
pub mod ids;
pub mod item;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use item::{MediaItem, Role};
pub use types::*;
