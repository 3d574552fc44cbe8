//! Pressroom Core Library
//!
//! Core types, configuration, routing and error handling for the Pressroom
//! static site generator.

pub mod category;
pub mod config;
pub mod content;
pub mod error;
pub mod frontmatter;
pub mod metadata;
pub mod router;

pub use category::{Category, CategoryResolver};
pub use config::Config;
pub use content::Page;
pub use error::{CoreError, Result};
pub use metadata::Metadata;
pub use router::{RoutePattern, Router, RouterPolicy};
