// API client module: a small blocking binding to the release endpoints of
// a single repository. It lists releases, creates one, and uploads an
// asset to the release it just created.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ReleaseError, Result};
use crate::transport::{ApiRequest, HttpTransport, Method, Transport, APPLICATION_JSON};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Username and password used for Basic auth. Held for the client's
/// lifetime, never written anywhere.
#[derive(Debug)]
pub struct Credentials {
    pub user: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(user: &str, password: &str) -> Result<Self> {
        if user.is_empty() {
            return Err(ReleaseError::MissingField("user"));
        }
        if password.is_empty() {
            return Err(ReleaseError::MissingField("password"));
        }
        Ok(Credentials {
            user: user.to_string(),
            password: SecretString::from(password.to_string()),
        })
    }
}

/// Target repository. The owner falls back to the authenticating user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub repo: String,
}

impl RepositoryRef {
    pub fn resolve(owner: Option<&str>, repo: &str, user: &str) -> Result<Self> {
        if repo.is_empty() {
            return Err(ReleaseError::MissingField("repo"));
        }
        let owner = owner.filter(|o| !o.is_empty()).unwrap_or(user);
        Ok(RepositoryRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

/// Body of the create-release call. Serializes to exactly the six fields
/// the endpoint accepts.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

impl ReleaseRequest {
    pub fn new(tag_name: impl Into<String>, name: impl Into<String>, body: impl Into<String>) -> Self {
        ReleaseRequest {
            tag_name: tag_name.into(),
            target_commitish: "master".into(),
            name: name.into(),
            body: body.into(),
            draft: false,
            prerelease: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("tag_name", &self.tag_name),
            ("target_commitish", &self.target_commitish),
            ("name", &self.name),
            ("body", &self.body),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ReleaseError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// A local file to attach to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub filename: PathBuf,
    pub content_type: String,
    /// Asset name shown on the release; defaults to the file's base name.
    pub name: Option<String>,
    /// Explicit upload target; defaults to the client's last created release.
    pub upload_uri: Option<String>,
}

impl AssetUpload {
    pub fn new(filename: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        AssetUpload {
            filename: filename.into(),
            content_type: content_type.into(),
            name: None,
            upload_uri: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_upload_uri(mut self, upload_uri: impl Into<String>) -> Self {
        self.upload_uri = Some(upload_uri.into());
        self
    }

    fn resolved_name(&self) -> Result<String> {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        self.filename
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(ReleaseError::MissingField("name"))
    }
}

/// Release API binding for one repository.
///
/// The client remembers the upload URL of the last release it created so
/// `upload_asset` can default to it. That field is plain mutable state:
/// `create_release` takes `&mut self`.
pub struct ReleaseClient<T: Transport = HttpTransport> {
    transport: T,
    api_base: String,
    credentials: Credentials,
    repository: RepositoryRef,
    upload_uri: Option<String>,
}

impl ReleaseClient<HttpTransport> {
    /// Create a client backed by the blocking HTTP transport.
    pub fn new(user: &str, password: &str, owner: Option<&str>, repo: &str) -> Result<Self> {
        let credentials = Credentials::new(user, password)?;
        let repository = RepositoryRef::resolve(owner, repo, user)?;
        Ok(Self::from_parts(HttpTransport::new()?, credentials, repository))
    }
}

impl<T: Transport> ReleaseClient<T> {
    pub fn with_transport(
        transport: T,
        user: &str,
        password: &str,
        owner: Option<&str>,
        repo: &str,
    ) -> Result<Self> {
        let credentials = Credentials::new(user, password)?;
        let repository = RepositoryRef::resolve(owner, repo, user)?;
        Ok(Self::from_parts(transport, credentials, repository))
    }

    fn from_parts(transport: T, credentials: Credentials, repository: RepositoryRef) -> Self {
        ReleaseClient {
            transport,
            api_base: DEFAULT_API_BASE.to_string(),
            credentials,
            repository,
            upload_uri: None,
        }
    }

    /// Point the client at another API root (e.g. an enterprise host).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repository
    }

    /// Upload target of the last successfully created release.
    pub fn upload_uri(&self) -> Option<&str> {
        self.upload_uri.as_deref()
    }

    pub fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.api_base, self.repository.owner, self.repository.repo
        )
    }

    /// GET the releases collection.
    pub fn list_releases(&self) -> Result<Vec<Value>> {
        let value = self.execute(Method::Get, self.releases_url(), None, None)?;
        Ok(serde_json::from_value(value)?)
    }

    /// POST a new release and remember its upload URL.
    ///
    /// The stored upload target is cleared first, so a failed call never
    /// leaves the previous release's URL behind.
    pub fn create_release(&mut self, release: &ReleaseRequest) -> Result<Value> {
        self.upload_uri = None;
        release.validate()?;

        let body = serde_json::to_vec(release)?;
        let response = self.execute(
            Method::Post,
            self.releases_url(),
            Some(APPLICATION_JSON.to_string()),
            Some(body),
        )?;

        match response.get("upload_url").and_then(Value::as_str) {
            Some(template) => {
                let upload_uri = strip_uri_template(template).to_string();
                info!(tag = %release.tag_name, %upload_uri, "release created");
                self.upload_uri = Some(upload_uri);
            }
            None => warn!(tag = %release.tag_name, "release created without an upload_url"),
        }
        Ok(response)
    }

    /// POST the raw bytes of a local file as a release asset.
    pub fn upload_asset(&self, asset: &AssetUpload) -> Result<Value> {
        if asset.filename.as_os_str().is_empty() {
            return Err(ReleaseError::MissingField("filename"));
        }
        if asset.content_type.is_empty() {
            return Err(ReleaseError::MissingField("content_type"));
        }
        let upload_uri = asset
            .upload_uri
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.upload_uri.as_deref())
            .ok_or(ReleaseError::MissingField("upload_uri"))?;
        let name = asset.resolved_name()?;
        let url = with_name_query(upload_uri, &name)?;

        let bytes = read_asset(&asset.filename)?;
        debug!(%url, size = bytes.len(), "uploading asset");
        let response = self.execute(
            Method::Post,
            url,
            Some(asset.content_type.clone()),
            Some(bytes),
        )?;
        info!(%name, "asset uploaded");
        Ok(response)
    }

    fn execute(
        &self,
        method: Method,
        url: String,
        content_type: Option<String>,
        body: Option<Vec<u8>>,
    ) -> Result<Value> {
        let request = ApiRequest {
            method,
            url,
            user: self.credentials.user.clone(),
            password: SecretString::from(self.credentials.password.expose_secret().to_string()),
            accept: APPLICATION_JSON,
            content_type,
            body,
        };
        let response = self.transport.send(request)?;
        if !response.is_success() {
            return Err(ReleaseError::Transport {
                status: response.status,
                body: response.body,
            });
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}

/// Drop a trailing URI template such as `{?name,label}`.
pub fn strip_uri_template(url: &str) -> &str {
    match url.find('{') {
        Some(start) if url.ends_with('}') => &url[..start],
        _ => url,
    }
}

fn with_name_query(upload_uri: &str, name: &str) -> Result<String> {
    let mut url = Url::parse(upload_uri)?;
    let pair = format!("name={}", urlencoding::encode(name));
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{pair}"),
        _ => pair,
    };
    url.set_query(Some(&query));
    Ok(url.into())
}

// The handle is closed when this returns, before the request goes out.
fn read_asset(path: &Path) -> Result<Vec<u8>> {
    let io_err = |source: std::io::Error| ReleaseError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ApiResponse, MockTransport};
    use serde_json::json;
    use std::io::Write;

    const RELEASES: &str = "https://api.github.com/repos/alice/proj/releases";

    fn client(transport: MockTransport) -> ReleaseClient<MockTransport> {
        ReleaseClient::with_transport(transport, "alice", "s3cret", None, "proj").unwrap()
    }

    fn reply(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            body: body.to_string(),
        }
    }

    fn asset_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn owner_defaults_to_user() {
        let c = client(MockTransport::new());
        assert_eq!(c.repository().owner, "alice");
        assert_eq!(c.releases_url(), RELEASES);

        let c = ReleaseClient::with_transport(MockTransport::new(), "alice", "pw", Some(""), "proj")
            .unwrap();
        assert_eq!(c.repository().owner, "alice");

        let c = ReleaseClient::with_transport(MockTransport::new(), "alice", "pw", Some("org"), "proj")
            .unwrap();
        assert_eq!(c.repository().owner, "org");
    }

    #[test]
    fn construction_requires_user_password_and_repo() {
        let missing = |user: &str, password: &str, repo: &str| -> &'static str {
            match ReleaseClient::with_transport(MockTransport::new(), user, password, None, repo) {
                Err(ReleaseError::MissingField(field)) => field,
                _ => panic!("expected MissingField"),
            }
        };
        assert_eq!(missing("", "pw", "proj"), "user");
        assert_eq!(missing("alice", "", "proj"), "password");
        assert_eq!(missing("alice", "pw", ""), "repo");
    }

    #[test]
    fn api_base_override_trims_trailing_slash() {
        let c = client(MockTransport::new()).with_api_base("https://ghe.example.com/api/v3/");
        assert_eq!(
            c.releases_url(),
            "https://ghe.example.com/api/v3/repos/alice/proj/releases"
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2").unwrap();
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn list_releases_gets_collection() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::Get
                    && req.url == RELEASES
                    && req.user == "alice"
                    && req.password.expose_secret() == "s3cret"
                    && req.accept == "application/json"
                    && req.body.is_none()
            })
            .times(1)
            .returning(|_| Ok(reply(200, r#"[{"id":1},{"id":2}]"#)));

        let releases = client(transport).list_releases().unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[1]["id"], 2);
    }

    #[test]
    fn list_releases_surfaces_status() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(reply(404, r#"{"message":"Not Found"}"#)));

        let err = client(transport).list_releases().unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn create_release_posts_six_fields_and_stores_upload_uri() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                let body: Value = serde_json::from_slice(req.body.as_deref().unwrap_or_default())
                    .unwrap_or(Value::Null);
                req.method == Method::Post
                    && req.url == RELEASES
                    && req.content_type.as_deref() == Some("application/json")
                    && req.accept == "application/json"
                    && body
                        == json!({
                            "tag_name": "v1.0",
                            "target_commitish": "release",
                            "name": "First",
                            "body": "notes",
                            "draft": true,
                            "prerelease": false
                        })
            })
            .times(1)
            .returning(|_| {
                Ok(reply(
                    201,
                    r#"{"id":7,"upload_url":"https://uploads.example.com/assets{?name,label}"}"#,
                ))
            });

        let mut c = client(transport);
        let mut release = ReleaseRequest::new("v1.0", "First", "notes");
        release.target_commitish = "release".into();
        release.draft = true;
        release.prerelease = false;

        let response = c.create_release(&release).unwrap();
        assert_eq!(response["id"], 7);
        assert_eq!(c.upload_uri(), Some("https://uploads.example.com/assets"));
    }

    #[test]
    fn release_request_defaults() {
        let release = ReleaseRequest::new("v1", "one", "b");
        assert_eq!(release.target_commitish, "master");
        assert!(!release.draft);
        assert!(release.prerelease);
    }

    #[test]
    fn create_release_rejects_missing_fields_without_sending() {
        let mut c = client(MockTransport::new());
        let cases = [
            (ReleaseRequest::new("", "n", "b"), "tag_name"),
            (ReleaseRequest::new("t", "", "b"), "name"),
            (ReleaseRequest::new("t", "n", ""), "body"),
            (
                ReleaseRequest {
                    target_commitish: String::new(),
                    ..ReleaseRequest::new("t", "n", "b")
                },
                "target_commitish",
            ),
        ];
        for (release, expected) in cases {
            match c.create_release(&release) {
                Err(ReleaseError::MissingField(field)) => assert_eq!(field, expected),
                other => panic!("expected MissingField({expected}), got {other:?}"),
            }
        }
    }

    #[test]
    fn failed_create_clears_previous_upload_uri() {
        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply(201, r#"{"upload_url":"https://u/first{?name}"}"#)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply(422, r#"{"message":"Validation Failed"}"#)));

        let mut c = client(transport);
        let release = ReleaseRequest::new("v1", "v1", "notes");
        c.create_release(&release).unwrap();
        assert_eq!(c.upload_uri(), Some("https://u/first"));

        let err = c.create_release(&release).unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(c.upload_uri(), None);
    }

    #[test]
    fn create_without_upload_url_leaves_target_empty() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(reply(201, r#"{"id":3}"#)));

        let mut c = client(transport);
        c.create_release(&ReleaseRequest::new("v1", "v1", "notes")).unwrap();
        assert_eq!(c.upload_uri(), None);
    }

    #[test]
    fn strip_uri_template_handles_plain_urls() {
        assert_eq!(strip_uri_template("https://u/x{?name,label}"), "https://u/x");
        assert_eq!(strip_uri_template("https://u/x{?name}"), "https://u/x");
        assert_eq!(strip_uri_template("https://u/x"), "https://u/x");
        assert_eq!(strip_uri_template("https://u/{x"), "https://u/{x");
    }

    #[test]
    fn upload_asset_requires_filename_content_type_and_target() {
        let file = asset_file(b"data");
        let c = client(MockTransport::new());

        let cases = [
            (AssetUpload::new("", "application/zip").with_upload_uri("https://u/x"), "filename"),
            (AssetUpload::new(file.path(), "").with_upload_uri("https://u/x"), "content_type"),
            (AssetUpload::new(file.path(), "application/zip"), "upload_uri"),
        ];
        for (asset, expected) in cases {
            match c.upload_asset(&asset) {
                Err(ReleaseError::MissingField(field)) => assert_eq!(field, expected),
                other => panic!("expected MissingField({expected}), got {other:?}"),
            }
        }
    }

    #[test]
    fn upload_asset_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.zip");
        let c = client(MockTransport::new());

        let asset = AssetUpload::new(&missing, "application/zip").with_upload_uri("https://u/x");
        match c.upload_asset(&asset) {
            Err(ReleaseError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn upload_asset_sends_raw_bytes_with_encoded_name() {
        let file = asset_file(&[0x50, 0x4b, 0x03, 0x04, 0xff]);
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::Post
                    && req.url == "https://u/x?name=my%20build%20v1.zip"
                    && req.content_type.as_deref() == Some("application/zip")
                    && req.accept == "application/json"
                    && req.body.as_deref() == Some(&[0x50, 0x4b, 0x03, 0x04, 0xff][..])
            })
            .times(1)
            .returning(|_| Ok(reply(201, r#"{"id":11,"name":"my build v1.zip"}"#)));

        let asset = AssetUpload::new(file.path(), "application/zip")
            .with_name("my build v1.zip")
            .with_upload_uri("https://u/x");
        let response = client(transport).upload_asset(&asset).unwrap();
        assert_eq!(response["id"], 11);
    }

    #[test]
    fn upload_asset_defaults_name_to_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        std::fs::write(&path, b"zip").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url == "https://u/x?name=out.zip")
            .times(1)
            .returning(|_| Ok(reply(201, "{}")));

        let asset = AssetUpload::new(&path, "application/zip").with_upload_uri("https://u/x");
        client(transport).upload_asset(&asset).unwrap();
    }

    #[test]
    fn upload_asset_non_success_is_transport_error() {
        let file = asset_file(b"data");
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(reply(500, "boom")));

        let asset = AssetUpload::new(file.path(), "text/plain").with_upload_uri("https://u/x");
        match client(transport).upload_asset(&asset) {
            Err(ReleaseError::Transport { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Transport error, got {other:?}"),
        }
    }

    #[test]
    fn name_query_percent_encodes_space_and_plus() {
        assert_eq!(
            with_name_query("https://u/x", "a b+c.bin").unwrap(),
            "https://u/x?name=a%20b%2Bc.bin"
        );
    }

    #[test]
    fn name_query_keeps_existing_query() {
        assert_eq!(
            with_name_query("https://u/x?label=a", "b.zip").unwrap(),
            "https://u/x?label=a&name=b.zip"
        );
    }
}
