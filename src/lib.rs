//! Form Bot — a conversational questionnaire over chat channels.

pub mod api;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod store;
