pub mod chat;
pub mod genai;
pub mod pipeline;
pub mod queries;
pub mod search;
pub mod server;
pub mod types;
pub mod verdict;
pub mod vision;
