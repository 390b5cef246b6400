//! logo-animator library crate.
//!
//! Generates a logo image from a text prompt and animates it into a short
//! video with the Gemini API. The binary in `main.rs` is a thin shell over
//! [`cli`].

pub mod cli;
pub mod config;
pub mod credential;
pub mod flow;
pub mod genai;
