//! GraphQL schema reconstruction without introspection.
//!
//! When a server disables introspection it still validates queries, and its
//! validation errors leak schema facts: "Cannot query field `x` on type
//! `User`. Did you mean `name`?" proves `User.name` exists. This crate sends
//! deliberately invalid documents, classifies the error messages that come
//! back, and assembles what they prove into an introspection-shaped schema.
//!
//! # Examples
//!
//! ```no_run
//! use graphql_oracle::{discover, Config, HttpExecutor, Prober};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("https://api.example.com/graphql")
//!         .with_header("Authorization", "Bearer my-token")
//!         .with_bucket_size(64);
//!     let prober = Prober::new(HttpExecutor::new(&config)?, config)?;
//!
//!     let wordlist = vec!["user".to_string(), "users".to_string(), "node".to_string()];
//!     let schema = discover(&prober, &wordlist, "query { FUZZ }", None).await?;
//!
//!     println!("{}", serde_json::to_string_pretty(&schema.to_json())?);
//!     Ok(())
//! }
//! ```

pub mod classify;
mod client;
mod config;
mod discover;
mod error;
mod probe;
mod types;

pub use client::{Executor, GraphQLError, GraphQLResponse, HttpExecutor};
pub use config::{validate_template, Config, DEFAULT_BUCKET_SIZE, DEFAULT_CONCURRENCY, PLACEHOLDER};
pub use discover::{discover, discover_type};
pub use error::{OracleError, Result};
pub use probe::Prober;
pub use types::*;
