use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Built-in page served when the pages root has nothing for a route.
pub const FALLBACK_PAGE: &str =
    "<!doctype html>\n<html><head><title>Home</title></head><body><main></main></body></html>\n";

/// Collapse a request path into `/`-separated segments without dot segments.
pub fn normalize_route(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." || segment.contains('\\') {
            return None;
        }
        segments.push(segment);
    }
    Some(segments.join("/"))
}

/// Candidate files for a route, most specific first.
fn candidates(root: &Path, route: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if !route.is_empty() {
        out.push(root.join(format!("{route}.html")));
        out.push(root.join(route).join("index.html"));
    }
    out.push(root.join("index.html"));
    out
}

/// Page html for `path`; the built-in page when nothing on disk matches.
pub async fn load_page(root: &Path, path: &str) -> anyhow::Result<String> {
    let Some(route) = normalize_route(path) else {
        tracing::warn!(%path, "rejected route with dot segments");
        return Ok(FALLBACK_PAGE.to_string());
    };
    for candidate in candidates(root, &route) {
        match fs::read_to_string(&candidate).await {
            Ok(contents) => return Ok(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("reading html {:?}", candidate));
            }
        }
    }
    Ok(FALLBACK_PAGE.to_string())
}
