//! Views of the desktop shell
//!
//! Every function here only reads state and returns widgets; all changes go
//! through `Message`s handled in `main.rs`.

pub mod carousel;
pub mod discussions;
pub mod feed;
pub mod form;
pub mod map;
pub mod reports;
