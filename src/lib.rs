//! # Property Agent
//!
//! A tool-calling agent over the water-to-wire property management API.
//!
//! This library provides:
//! - An authenticated API client with bearer-token caching and a single
//!   retry on 401
//! - A registry of named tools wrapping the client's endpoints
//! - A bounded tool-calling loop against an OpenAI-compatible chat model
//! - A requirements workflow that audits metric groups in batch
//!
//! ## Example
//!
//! ```rust,ignore
//! use property_agent::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = Agent::from_config(&config)?;
//! let result = agent.run("What is the name of property 3?").await?;
//! println!("{}", result.reply);
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod endpoint_index;
pub mod llm;
pub mod tools;
pub mod workflow;

pub use config::Config;
