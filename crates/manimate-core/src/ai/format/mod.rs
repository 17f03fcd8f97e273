//! Request/response conversion per API format

pub mod anthropic;
pub mod openai;
