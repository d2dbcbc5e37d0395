//! HTTP request handlers

pub mod stream;

pub use stream::{HandlerError, StreamQuery, stream_content};
