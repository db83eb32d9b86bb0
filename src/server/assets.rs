// src/server/assets.rs

//! Static file serving from the build output tree, plus the live-reload
//! client script.

use std::path::{Component, Path, PathBuf};

use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::server::{CLIENT_PATH, EVENTS_PATH, SharedState};

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("__EVENTS__");
  source.addEventListener("css", function () {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    for (var i = 0; i < links.length; i++) {
      var url = new URL(links[i].href, location.href);
      url.searchParams.set("_reload", Date.now().toString());
      links[i].href = url.toString();
    }
  });
  source.addEventListener("reload", function () {
    location.reload();
  });
})();
"#;

/// GET /__assetpipe/client.js
pub async fn client_script() -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_JS.replace("__EVENTS__", EVENTS_PATH),
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Map a percent-encoded request path onto a file under `root`.
///
/// Returns `None` for any path containing a `..` segment once decoded, and
/// for paths that do not decode to UTF-8.
pub fn resolve_request_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
    let rel = Path::new(decoded.trim_start_matches('/'));
    let mut out = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Insert the client script tag before the last `</body>`, or append it when
/// the page has no body end tag.
pub fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script src="{CLIENT_PATH}"></script>"#);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..idx]);
            out.push_str(&tag);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{tag}"),
    }
}

/// Fallback handler that serves files from the build output tree.
pub async fn static_handler(State(app): State<SharedState>, uri: Uri) -> Response {
    let Some(mut path) = resolve_request_path(&app.root, uri.path()) else {
        debug!(path = %uri.path(), "rejected path traversal");
        return not_found();
    };

    if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
        path.push("index.html");
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return not_found(),
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let body = if mime.essence_str() == "text/html" {
        match String::from_utf8(bytes) {
            Ok(html) => inject_client(&html).into_bytes(),
            Err(e) => e.into_bytes(),
        }
    } else {
        bytes
    };

    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}
