use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Every deployment invalidates everything: the upload replaces the bucket
/// contents wholesale, so edge caches must not serve any stale path.
pub const INVALIDATE_ALL: &str = "/*";

/// Walks the asset directory and returns `(local path, object key)` pairs,
/// sorted by key so uploads happen in a stable order.
pub fn collect_assets(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !dir.is_dir() {
        return Err(Error::AssetDirMissing(dir.display().to_string()));
    }
    let mut out = vec![];
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let key = object_key(dir, entry.path());
        out.push((entry.path().to_path_buf(), key));
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(out)
}

/// Object keys mirror the directory structure with forward slashes,
/// whatever the local path separator is.
fn object_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" | "map" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Uploads the whole asset directory into the bucket, replacing any object
/// that shares a key. Returns the number of uploaded objects.
pub async fn upload_assets(conf: &aws_config::SdkConfig, bucket: &str, dir: &Path) -> Result<usize> {
    let client = aws_sdk_s3::Client::new(conf);
    let assets = collect_assets(dir)?;
    for (path, key) in &assets {
        debug!(key = %key, "uploading");
        let body = ByteStream::from_path(path).await.map_err(Error::aws)?;
        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type_for(key))
            .body(body)
            .send()
            .await
            .map_err(Error::aws)?;
    }
    info!(bucket, count = assets.len(), "assets uploaded");
    Ok(assets.len())
}

/// Invalidates every path on the distribution. Must run after the upload,
/// or the edges can keep serving the previous deployment.
pub async fn invalidate_all(conf: &aws_config::SdkConfig, distribution_id: &str) -> Result<()> {
    let client = aws_sdk_cloudfront::Client::new(conf);
    let caller_reference = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string();
    let batch = InvalidationBatch::builder()
        .caller_reference(caller_reference)
        .paths(Paths::builder().quantity(1).items(INVALIDATE_ALL).build())
        .build();
    client
        .create_invalidation()
        .distribution_id(distribution_id)
        .invalidation_batch(batch)
        .send()
        .await
        .map_err(Error::aws)?;
    info!(distribution_id, path = INVALIDATE_ALL, "cache invalidated");
    Ok(())
}

/// Deletes every object in the bucket so stack deletion can remove it.
/// Returns the number of deleted objects.
pub async fn empty_bucket(conf: &aws_config::SdkConfig, bucket: &str) -> Result<usize> {
    let client = aws_sdk_s3::Client::new(conf);
    let mut deleted = 0usize;
    loop {
        let resp = client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .map_err(Error::aws)?;
        let mut ids = vec![];
        for object in resp.contents().unwrap_or_default() {
            if let Some(key) = object.key() {
                ids.push(ObjectIdentifier::builder().key(key).build());
            }
        }
        if ids.is_empty() {
            break;
        }
        deleted += ids.len();
        client
            .delete_objects()
            .bucket(bucket)
            .delete(Delete::builder().set_objects(Some(ids)).build())
            .send()
            .await
            .map_err(Error::aws)?;
    }
    info!(bucket, count = deleted, "bucket emptied");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_always_targets_every_path() {
        assert_eq!(INVALIDATE_ALL, "/*");
    }

    #[test]
    fn content_types_cover_common_site_assets() {
        assert_eq!(content_type_for("index.html"), "text/html");
        assert_eq!(content_type_for("assets/app.CSS"), "text/css");
        assert_eq!(content_type_for("bundle.js"), "text/javascript");
        assert_eq!(content_type_for("logo.svg"), "image/svg+xml");
        assert_eq!(content_type_for("theme.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn collect_assets_mirrors_the_directory_with_forward_slash_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::create_dir_all(dir.path().join("static/js")).unwrap();
        std::fs::write(dir.path().join("static/js/app.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join("static/style.css"), "body{}").unwrap();

        let assets = collect_assets(dir.path()).unwrap();
        let keys: Vec<&str> = assets.iter().map(|(_, k)| k.as_str()).collect();
        assert_eq!(keys, vec!["index.html", "static/js/app.js", "static/style.css"]);
    }

    #[test]
    fn collect_assets_rejects_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(collect_assets(&missing).is_err());
    }
}
