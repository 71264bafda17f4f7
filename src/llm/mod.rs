//! LLM backend integration.
//!
//! The generation backend is a black box: a prompt pair and sampling
//! parameters go in, free text (or a transport/auth error) comes out.
//! Everything that depends on the shape of that text lives in
//! [`crate::generator::parser`].
//!
//! ```ignore
//! use std::time::Duration;
//! use query_forge::llm::{GenerationRequest, LlmProvider, Message, OpenAiCompatClient};
//!
//! let client = OpenAiCompatClient::new(
//!     "https://api.deepseek.com/v1",
//!     api_key,
//!     "deepseek-chat",
//!     Duration::from_secs(30),
//! )?;
//! let request = GenerationRequest::new("deepseek-chat", vec![Message::user("hi")]);
//! let response = client.generate(request).await?;
//! ```

pub mod client;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, OpenAiCompatClient,
    SamplingParams, Usage,
};
