//! # doclib-directive
//!
//! Directive lines embedded in documents, grouped per document and dispatched
//! to agents.
//!
//! ```text
//! text ──parse_line──▶ Directive ──DirectiveIndex──▶ key → {values}
//!                                                        │
//!                                   AgentTable::dispatch ▼
//!                                                   Vec<AgentRun>
//! ```

pub mod agent;
pub mod error;
pub mod index;
pub mod parser;

pub use agent::{AgentEnv, AgentKind, AgentRun, AgentTable, Document, Effect, Handler};
pub use error::{AgentError, DirectiveError};
pub use index::DirectiveIndex;
pub use parser::{parse_line, Directive, DirectiveRules};
