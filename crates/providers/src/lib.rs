//! Model backend implementations for Parallax.
//!
//! All backends implement the `parallax_core::LanguageModel` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatModel;
