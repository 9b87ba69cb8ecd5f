//! # docqa
//!
//! Question answering over uploaded PDF documents.
//!
//! A session collects an API key, indexes the pages of one batch of PDFs
//! into an ephemeral vector collection, and answers questions by handing
//! the most similar passages to a chat model. Every answer is appended to a
//! persistent history that survives across sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunker  │──▶│  Index   │──▶│ Vector store │
//! │ (lopdf)  │   │ 1000/200 │   │ (embed)  │   │ sqlite/memory│
//! └──────────┘   └──────────┘   └──────────┘   └──────┬───────┘
//!                                                     │ top-k
//!                 ┌──────────┐   ┌──────────┐         │
//!                 │ History  │◀──│  Answer  │◀────────┘
//!                 │ (sqlite) │   │  (chat)  │
//!                 └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`credential`] | API key gate |
//! | [`loader`] | PDF uploads, temp files, page extraction |
//! | [`chunk`] | Fixed-window chunking with exact overlap |
//! | [`index`] | Embed chunks and rebuild the session index |
//! | [`store`] | Vector store trait, SQLite and in-memory backends |
//! | [`history`] | Persistent question/answer log |
//! | [`answer`] | Retrieval + chat answering pipeline |
//! | [`session`] | Session context tying the pipeline together |
//! | [`surface`] | Interactive terminal front end |
//! | [`commands`] | Non-interactive CLI commands |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat-completion provider abstraction |
//! | [`config`] | TOML configuration |
//! | [`error`] | Domain error taxonomy |
//! | [`db`] | SQLite connections |
//! | [`migrate`] | Schemas |
//! | [`progress`] | Progress reporting on stderr |

pub mod answer;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod credential;
pub mod db;
pub mod embedding;
pub mod error;
pub mod history;
pub mod http;
pub mod index;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod session;
pub mod store;
pub mod surface;

#[cfg(test)]
mod testutil;
