//! Data models for documents, images and configuration.

pub mod config;
pub mod image;
