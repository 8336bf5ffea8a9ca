// Chunked NDJSON streaming utilities
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;

/// One JSON document per line, sent as each item is produced.
pub fn ndjson_stream<S, T>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + 'static,
{
    let byte_stream = stream.map(|item| serialize_line(&item));
    let body = Body::from_stream(byte_stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn serialize_line<T: Serialize>(item: &T) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(item).map_err(std::io::Error::other)?;
    let mut chunk = BytesMut::with_capacity(json.len() + 1);
    chunk.put_slice(&json);
    chunk.put_u8(b'\n');
    Ok(chunk.freeze())
}

/// Helper to stream an already collected list.
pub fn stream_items<T>(items: Vec<T>) -> impl IntoResponse
where
    T: Serialize + Send + 'static,
{
    match ndjson_stream(futures::stream::iter(items)) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
