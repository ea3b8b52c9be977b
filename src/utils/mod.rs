//! Utility modules for Sprite Fetch
//!
//! This module contains various utility functions organized by functionality:
//! - `files`: File operations and directory management
//! - `images`: Typed image transforms and validation
//! - `http`: HTTP client utilities

pub mod files;
pub mod http;
pub mod images;
