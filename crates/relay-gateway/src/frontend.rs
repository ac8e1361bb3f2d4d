//! Embedded chat page and its static assets

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use rust_embed::RustEmbed;
use std::sync::Arc;

use crate::GatewayState;

#[derive(RustEmbed)]
#[folder = "ui/"]
struct Assets;

pub fn frontend_router() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(index_handler))
        .route("/assets/{*path}", get(asset_handler))
}

async fn index_handler(State(state): State<Arc<GatewayState>>) -> Response {
    match Assets::get("index.html") {
        Some(file) => {
            let page = String::from_utf8_lossy(&file.data)
                .replace("{{TITLE}}", &escape_html(&state.settings.ui_title));
            Html(page).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "index.html missing").into_response(),
    }
}

async fn asset_handler(Path(path): Path<String>) -> Response {
    match Assets::get(&path) {
        Some(file) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                file.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>A & B</b>"), "&lt;b&gt;A &amp; B&lt;/b&gt;");
        assert_eq!(escape_html("ADK A2A Assistant"), "ADK A2A Assistant");
    }

    #[test]
    fn test_assets_are_embedded() {
        assert!(Assets::get("index.html").is_some());
        assert!(Assets::get("app.js").is_some());
        assert!(Assets::get("style.css").is_some());
        assert!(Assets::get("missing.txt").is_none());
    }
}
