// UI layer: gathers release parameters from the operator and drives the
// create-then-upload flow. Prompting sits behind `InputProvider` so the
// flow can be exercised with scripted answers instead of a terminal.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::api::{AssetUpload, ReleaseClient, ReleaseRequest};
use crate::remote::RemoteDefaults;
use crate::transport::{HttpTransport, Transport};

/// Source of operator answers.
pub trait InputProvider {
    /// Ask until a non-blank answer is given. A blank answer takes the
    /// default when there is one. The answer is returned as typed.
    fn text(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Ask once; an empty answer is allowed.
    fn optional_text(&mut self, prompt: &str) -> Result<String>;

    /// Hidden input, non-empty.
    fn secret(&mut self, prompt: &str) -> Result<SecretString>;
}

/// Prompts on the controlling terminal with `dialoguer`.
pub struct TerminalInput;

impl InputProvider for TerminalInput {
    fn text(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new();
        input
            .with_prompt(prompt)
            .validate_with(|value: &String| -> std::result::Result<(), &'static str> {
                if value.trim().is_empty() {
                    Err("a value is required")
                } else {
                    Ok(())
                }
            });
        if let Some(default) = default {
            input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn optional_text(&mut self, prompt: &str) -> Result<String> {
        let value: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(value)
    }

    fn secret(&mut self, prompt: &str) -> Result<SecretString> {
        // `Password` hides input and re-asks on an empty answer.
        let value = Password::new().with_prompt(prompt).interact()?;
        Ok(SecretString::from(value))
    }
}

/// Everything needed for one create-and-upload run.
#[derive(Debug)]
pub struct ReleasePlan {
    /// `None` means "same as user".
    pub owner: Option<String>,
    pub repo: String,
    pub user: String,
    pub password: SecretString,
    pub release: ReleaseRequest,
    pub asset: AssetUpload,
}

impl ReleasePlan {
    pub fn client(&self) -> Result<ReleaseClient<HttpTransport>> {
        let client = ReleaseClient::new(
            &self.user,
            self.password.expose_secret(),
            self.owner.as_deref(),
            &self.repo,
        )?;
        Ok(client)
    }
}

/// Responses of the two calls of a run.
#[derive(Debug)]
pub struct Published {
    pub release: Value,
    pub asset: Value,
}

/// Ask for owner, repo, credentials, release fields and the asset.
pub fn gather_inputs<I: InputProvider>(
    input: &mut I,
    defaults: Option<&RemoteDefaults>,
) -> Result<ReleasePlan> {
    let owner = match defaults {
        Some(d) => field(input, "Owner", Some(d.owner.as_str()))?,
        None => input.optional_text("Owner (blank for your user)")?.trim().to_string(),
    };
    let repo = field(input, "Repository", defaults.map(|d| d.repo.as_str()))?;
    let user = field(input, "User", None)?;
    let password = input.secret("Password")?;

    let tag_name = field(input, "Tag name", None)?;
    let name = field(input, "Release name", Some(tag_name.as_str()))?;
    // Leading indentation in the body is kept.
    let body = unescape_body(&input.text("Release body (\\n for new lines)", None)?);

    let filename = field(input, "Asset file", None)?;
    let content_type = field(input, "Content type", Some(guess_content_type(Path::new(&filename))))?;

    Ok(ReleasePlan {
        owner: Some(owner).filter(|o| !o.is_empty()),
        repo,
        user,
        password,
        release: ReleaseRequest::new(tag_name, name, body),
        asset: AssetUpload::new(filename, content_type),
    })
}

fn field<I: InputProvider>(input: &mut I, prompt: &str, default: Option<&str>) -> Result<String> {
    Ok(input.text(prompt, default)?.trim().to_string())
}

/// Create the release, then upload the asset to it.
pub fn publish<T: Transport>(client: &mut ReleaseClient<T>, plan: &ReleasePlan) -> Result<Published> {
    let release = with_spinner("Creating release...", || client.create_release(&plan.release))?
        .with_context(|| format!("creating release {}", plan.release.tag_name))?;

    let asset = with_spinner("Uploading asset...", || client.upload_asset(&plan.asset))?
        .with_context(|| format!("uploading {}", plan.asset.filename.display()))?;

    Ok(Published { release, asset })
}

fn with_spinner<R>(message: &'static str, f: impl FnOnce() -> R) -> Result<R> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let out = f();
    spinner.finish_and_clear();
    Ok(out)
}

/// Expand `\n` and `\r` into real line breaks and `\\` into a backslash.
/// Other backslash sequences are left as typed.
pub fn unescape_body(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// MIME type offered as the content-type default.
pub fn guess_content_type(path: &Path) -> &'static str {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if file.ends_with(".tar.gz") || file.ends_with(".tgz") {
        return "application/gzip";
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "bz2" => "application/x-bzip2",
        "xz" => "application/x-xz",
        "7z" => "application/x-7z-compressed",
        "exe" | "msi" => "application/vnd.microsoft.portable-executable",
        "dmg" => "application/x-apple-diskimage",
        "deb" => "application/vnd.debian.binary-package",
        "rpm" => "application/x-rpm",
        "jar" => "application/java-archive",
        "json" => "application/json",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}
