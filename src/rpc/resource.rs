//! Raw byte-resource route.
//!
//! `GET /resource?resource-id=<id>` streams bytes straight from a
//! [`ResourceStore`]. The route is authenticated like every other route but
//! never passes through the permission proxy.

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 64 * 1024;

/// An opened resource.
pub struct Resource {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    pub len: Option<u64>,
}

/// Source of raw resources addressed by id.
pub trait ResourceStore: Send + Sync {
    /// `Ok(None)` when no resource has this id.
    fn open<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Resource>, io::Error>>;
}

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    #[serde(rename = "resource-id")]
    pub resource_id: Option<String>,
}

/// Ids are bare names; anything that could walk a directory tree is refused.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

pub fn resource_route(store: Arc<dyn ResourceStore>) -> MethodRouter {
    get(serve_resource).with_state(store)
}

async fn serve_resource(
    State(store): State<Arc<dyn ResourceStore>>,
    Query(query): Query<ResourceQuery>,
) -> Response {
    let Some(id) = query.resource_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing resource-id").into_response();
    };
    if !is_valid_id(&id) {
        return (StatusCode::BAD_REQUEST, "invalid resource-id").into_response();
    }

    let resource = match store.open(&id).await {
        Ok(Some(resource)) => resource,
        Ok(None) => return (StatusCode::NOT_FOUND, "resource not found").into_response(),
        Err(e) => {
            tracing::error!(resource_id = %id, error = %e, "Failed to open resource");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to open resource").into_response();
        }
    };

    let stream = futures_util::stream::try_unfold(resource.reader, |mut reader| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), reader)))
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream");
    if let Some(len) = resource.len {
        response = response.header(header::CONTENT_LENGTH, len);
    }
    response
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
