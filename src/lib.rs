//! Dental photo annotation core
//!
//! Operators draw labelled shapes over three intra-oral photos, save the
//! shapes with a flattened JPEG per photo, and generate a PDF screening
//! report once treatment recommendations are written.

pub mod annotations;
pub mod canvas;
pub mod config;
pub mod domain;
pub mod error;
pub mod intake;
pub mod render;
pub mod report;
pub mod session;
pub mod store;
