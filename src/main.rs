// Entrypoint for the CLI application.
// - Keeps `main` small: find repository defaults, ask the operator for the
//   rest, then create the release and upload the asset.
// - Returns `anyhow::Result` so any failure exits non-zero with its cause.

use release_uploader::remote;
use release_uploader::ui::{gather_inputs, publish, TerminalInput};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Owner/repo defaults come from `origin`; without one we just ask.
    let defaults = match remote::detect_origin(".") {
        Ok(defaults) => Some(defaults),
        Err(e) => {
            debug!(error = %e, "no repository defaults");
            None
        }
    };

    let plan = gather_inputs(&mut TerminalInput, defaults.as_ref())?;
    let mut client = plan.client()?;
    let published = publish(&mut client, &plan)?;

    match published.release.get("html_url").and_then(|v| v.as_str()) {
        Some(url) => println!("Release created: {url}"),
        None => println!("Release {} created", plan.release.tag_name),
    }
    match published.asset.get("browser_download_url").and_then(|v| v.as_str()) {
        Some(url) => println!("Asset uploaded: {url}"),
        None => println!("Asset uploaded"),
    }
    Ok(())
}
