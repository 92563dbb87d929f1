// Library root
// -----------
// Core of the `mockfactory` CLI, a client for a remote sandboxed code
// execution service.
//
// Module responsibilities:
// - `config`: per-user settings file and the separately stored bearer token.
// - `api`: blocking HTTP client for the service (auth, execution, usage).
// - `language`: maps source file extensions to service language names.
// - `cli`: clap argument model for the binary.
// - `ui`: prompts and rendering; the only module that writes to the terminal.
// - `logging`: tracing subscriber setup.
pub mod api;
pub mod cli;
pub mod config;
pub mod language;
pub mod logging;
pub mod ui;

pub use api::{ApiClient, ApiError, ExecutionResult, Profile, UsageInfo};
pub use config::{Config, ConfigError, ConfigKey, ConfigStore};
