//! Classifies a file-bearing parameter as local path, base64 blob, or URLs.

use crate::methods::BASE64_FLAG;
use crate::params::{is_truthy, Params};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use courier_core::error::CourierError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    /// An existing local file, already read.
    Local { path: PathBuf, bytes: Vec<u8> },
    /// Bytes decoded from a base64 parameter.
    Base64(Vec<u8>),
    /// Remote URLs to try in order.
    Urls(Vec<String>),
}

/// Decide what the file field of `params` refers to.
///
/// Returns `None` when the field is absent or null. A path that cannot be
/// stat'ed or read is not an error: it simply is not treated as local.
pub async fn resolve(field: &str, params: &Params) -> Result<Option<FileSource>, CourierError> {
    let value = match params.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    if let Value::String(s) = value {
        if let Some(bytes) = read_local(Path::new(s)).await {
            debug!("[{field}] local file {s}");
            return Ok(Some(FileSource::Local {
                path: PathBuf::from(s),
                bytes,
            }));
        }

        if is_truthy(params.get(BASE64_FLAG)) {
            debug!("[{field}] base64-encoded file");
            let bytes = BASE64
                .decode(s.trim())
                .map_err(|e| CourierError::Parse(format!("`{field}` is not valid base64: {e}")))?;
            return Ok(Some(FileSource::Base64(bytes)));
        }

        debug!("[{field}] file is a URL");
        return Ok(Some(FileSource::Urls(vec![s.clone()])));
    }

    if let Value::Array(items) = value {
        let urls = items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CourierError::Parse(format!("`{field}` candidates must be URL strings"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if urls.is_empty() {
            return Err(CourierError::Parse(format!(
                "`{field}` has no candidate URLs"
            )));
        }
        debug!("[{field}] {} candidate URLs", urls.len());
        return Ok(Some(FileSource::Urls(urls)));
    }

    Err(CourierError::Parse(format!(
        "`{field}` must be a path, base64 string, URL, or list of URLs"
    )))
}

async fn read_local(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => tokio::fs::read(path).await.ok(),
        _ => None,
    }
}

/// File name for an upload part.
pub fn upload_name(source_hint: &str, field: &str) -> String {
    let without_query = source_hint.split(['?', '#']).next().unwrap_or_default();
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or_default(),
        None => without_query,
    };
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(name) if name.contains('.') => name.to_string(),
        _ => format!("{field}.bin"),
    }
}
