//! uta-net lyrics tagger - shared modules for both binaries.

pub mod catalog;
pub mod error;
pub mod fallback;
pub mod html;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod safety;
pub mod scoring;
pub mod tags;
pub mod utanet;

#[cfg(test)]
pub mod test_utils;
