pub mod agent;
pub mod config;
pub mod llm;
pub mod sandbox;
pub mod tools;
