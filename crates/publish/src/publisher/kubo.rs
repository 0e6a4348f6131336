//! Client for a local node's HTTP API.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use url::form_urlencoded;

use super::{AddedEntry, LocalNodeClient};
use crate::{fs::FsHandler, http};

const DIRECTORY_MIME: &str = "application/x-directory";
const FILE_MIME: &str = "application/octet-stream";

/// One line of the add endpoint's newline-delimited JSON reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    name: String,
    hash: String,
}

/// Adds directories through `POST /api/v0/add`.
#[derive(Debug, Clone)]
pub struct KuboClient {
    client: reqwest::Client,
}

impl KuboClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http::create_client(http::UPLOAD_TIMEOUT)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Build the multipart body for `directory`, with every path prefixed by the
/// directory's own name so the node reports the root last.
///
/// The node URL-decodes part file names, so each path segment is encoded.
async fn directory_form(directory: &Path) -> Result<Form> {
    let root = directory
        .file_name()
        .context("Directory to add must have a name")?
        .to_string_lossy()
        .into_owned();
    let root = encode_segment(&root);

    let listing = FsHandler::walk(directory).await?;

    let mut form = Form::new().part("file", directory_part(root.clone())?);
    for dir in &listing.dirs {
        form = form.part("file", directory_part(format!("{root}/{}", to_slash(dir)))?);
    }

    for file in listing.files {
        let bytes = tokio::fs::read(directory.join(&file))
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        form = form.part(
            "file",
            Part::bytes(bytes)
                .file_name(format!("{root}/{}", to_slash(&file)))
                .mime_str(FILE_MIME)?,
        );
    }

    Ok(form)
}

fn directory_part(name: String) -> Result<Part> {
    Ok(Part::bytes(Vec::new())
        .file_name(name)
        .mime_str(DIRECTORY_MIME)?)
}

fn encode_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

/// Relative path as `/`-joined encoded segments.
fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| encode_segment(&c.as_os_str().to_string_lossy()))
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_add_response(body: &str) -> Result<Vec<AddedEntry>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let entry: AddResponse =
                serde_json::from_str(line).context("Failed to parse add response line")?;
            Ok(AddedEntry {
                name: entry.name,
                hash: entry.hash,
            })
        })
        .collect()
}

impl LocalNodeClient for KuboClient {
    async fn add_recursive(&self, api_url: &str, directory: &Path) -> Result<Vec<AddedEntry>> {
        let form = directory_form(directory).await?;
        let url = format!("{}/api/v0/add", api_url.trim_end_matches('/'));

        tracing::debug!(url = %url, directory = %directory.display(), "Adding directory to local node");

        let body = self
            .client
            .post(&url)
            .query(&[("pin", "true"), ("progress", "false")])
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to send add request to {url}"))?
            .error_for_status()
            .context("Local node rejected add request")?
            .text()
            .await
            .context("Failed to read add response")?;

        parse_add_response(&body)
    }
}
