//! Checksum-verified download of an artifact into the artifact directory.

use futures::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::ArtifactError;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteArtifact {
    pub url: String,
    /// Lowercase hex SHA-256 of the expected file.
    pub sha256: String,
    pub file_name: String,
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn client(timeout: Duration) -> Result<reqwest::Client, ArtifactError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ArtifactError::fetch("http client", e))
}

/// Ensure `dir/file_name` holds the artifact with the expected digest.
///
/// An existing file with the right digest is reused without touching the
/// network. Transport failures are retried up to `attempts` times; an
/// HTML answer or a digest mismatch is not.
pub async fn fetch_artifact(
    client: &reqwest::Client,
    remote: &RemoteArtifact,
    dir: &Path,
    attempts: u32,
) -> Result<PathBuf, ArtifactError> {
    let name = remote.file_name.as_str();
    let dest = dir.join(name);
    let expected = remote.sha256.to_ascii_lowercase();

    if let Ok(existing) = tokio::fs::read(&dest).await {
        if sha256_hex(&existing) == expected {
            tracing::info!(artifact = name, "using cached artifact");
            return Ok(dest);
        }
        tracing::warn!(artifact = name, "cached artifact has wrong digest; downloading again");
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ArtifactError::fetch(name, e))?;
    let part = dest.with_extension("part");

    let attempts = attempts.max(1);
    let mut attempt = 1;
    let actual = loop {
        match download(client, remote, &part).await {
            Ok(digest) => break digest,
            Err(e @ ArtifactError::Fetch { .. }) if attempt < attempts => {
                tracing::warn!(artifact = name, attempt, error = %e, "download failed; retrying");
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                attempt += 1;
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        }
    };

    if actual != expected {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(ArtifactError::Checksum {
            name: name.to_string(),
            expected,
            actual,
        });
    }

    tokio::fs::rename(&part, &dest)
        .await
        .map_err(|e| ArtifactError::fetch(name, e))?;
    tracing::info!(artifact = name, url = %remote.url, "downloaded artifact");
    Ok(dest)
}

/// Stream the body into `part`, returning its SHA-256.
async fn download(
    client: &reqwest::Client,
    remote: &RemoteArtifact,
    part: &Path,
) -> Result<String, ArtifactError> {
    let name = remote.file_name.as_str();
    let resp = client
        .get(&remote.url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ArtifactError::fetch(name, e))?;

    // share links answer with an HTML interstitial instead of the file
    let is_html = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("text/html"));
    if is_html {
        return Err(ArtifactError::malformed(name, "server returned an HTML page instead of the artifact"));
    }

    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| ArtifactError::fetch(name, e))?;
    let mut hasher = Sha256::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ArtifactError::fetch(name, e))?;
        hasher.update(&chunk);
        file.write_all(&chunk)
            .await
            .map_err(|e| ArtifactError::fetch(name, e))?;
    }
    file.flush().await.map_err(|e| ArtifactError::fetch(name, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}
