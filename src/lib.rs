// Library root
// -----------
// The binary (`main.rs`) only parses the configuration, sets up logging
// and hands over to `ui::run`.
//
// Module responsibilities:
// - `config`: command-line flags / environment variables and the frozen
//   `Config` built from them.
// - `api`: HTTP calls against the imaging API (login, job list, archive
//   download).
// - `session`: the login cookies plus facility id, attached to each request.
// - `job`: job descriptors and archive file naming.
// - `error`: per-phase error types.
// - `ui`: the sequential run with progress bars.
// - `logging`: console or log-file output.
pub mod api;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod session;
pub mod ui;
