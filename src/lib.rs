// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to run the interactive release flow.
//
// Module responsibilities:
// - `api`: the release client (list, create, upload) for one repository.
// - `transport`: the HTTP seam the client sends its requests through.
// - `remote`: owner/repo defaults from the local git `origin` remote.
// - `ui`: terminal prompts and the create-then-upload flow.
// - `error`: error taxonomy shared by the above.
//
// The client never touches the terminal, so it can be driven with
// programmatic inputs and a stub transport.
pub mod api;
pub mod error;
pub mod remote;
pub mod transport;
pub mod ui;

pub use api::{AssetUpload, ReleaseClient, ReleaseRequest, RepositoryRef};
pub use error::{ReleaseError, Result};
