//! Election digest bot: daily channel digest with admin approval.

pub mod bot;
pub mod channels;
pub mod config;
pub mod drafts;
pub mod error;
pub mod format;
pub mod llm;
pub mod pipeline;
pub mod scheduler;

#[cfg(test)]
mod test_support;
