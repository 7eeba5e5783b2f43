//! # EthicsNavi
//!
//! A guided clinical-ethics interview based on Jonsen's four-box method. The
//! interview walks a care team through four fixed topics (medical
//! indications, patient preferences, quality of life, contextual features),
//! asks streamed questions through Langbase Pipes, detects when each topic
//! is covered, synthesizes the results into a four-box table, and renders a
//! PDF report with balanced side-by-side columns.
//!
//! ## Architecture
//!
//! ```text
//! Console (stdin) → InterviewMachine → ReasoningEngine (Langbase Pipes, HTTP)
//!                         ↓
//!                 Session → SQLite (SessionStore)
//!                         ↓
//!                 Report layout → PDF
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ethics_navi::{Config, interview::{InterviewMachine, Session}};
//! use ethics_navi::langbase::LangbaseClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = LangbaseClient::new(&config.langbase, config.request.clone())?;
//!     let machine = InterviewMachine::new(Arc::new(client), &config.pipes, config.report.clone());
//!
//!     let mut session = Session::new();
//!     machine.submit_case(&mut session, "82-year-old with aspiration pneumonia ...");
//!     machine.open_active_topic(&mut session, |f| print!("{f}")).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration loaded from the environment.
pub mod config;
/// Line-oriented console driver.
pub mod console;
/// Error types and result aliases.
pub mod error;
/// Interview topics, session state and the state machine.
pub mod interview;
/// Langbase Pipes client and the reasoning-engine seam.
pub mod langbase;
/// Prompts for the interview pipes.
pub mod prompts;
/// PDF report layout and rendering.
pub mod report;
/// Session persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
