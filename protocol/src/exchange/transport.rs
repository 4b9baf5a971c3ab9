//! Supplier transport.
//!
//! The fan-out talks to suppliers only through [`SupplierTransport`]: hand it
//! an encoded tree and a supplier address, get back the encoded response
//! subtree or a [`ProtocolError::SupplierFailure`]. [`HttpTransport`] is the
//! production implementation; tests substitute in-memory ones.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use crate::config::{
    FAILED_OVERSIZED_RESPONSE, FAILED_TIMEOUT, MAX_TRANSACTION_BYTES, TRANSACTION_PATH,
    TREE_CONTENT_TYPE,
};
use crate::error::ProtocolError;

/// Delivers an encoded tree to one supplier.
#[async_trait]
pub trait SupplierTransport: Send + Sync {
    /// Posts `body` to `supplier` and returns the response body of a
    /// successful (200) reply. Anything else is a
    /// [`ProtocolError::SupplierFailure`] whose `reason` ends up in the
    /// `Failed` node.
    async fn post_transaction(&self, supplier: &str, body: Vec<u8>)
        -> Result<Vec<u8>, ProtocolError>;
}

/// `POST <scheme>://<supplier>/transaction` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    scheme: String,
    max_response_bytes: usize,
}

impl HttpTransport {
    /// Builds a transport whose requests give up after `timeout`.
    pub fn new(scheme: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            scheme: scheme.into(),
            max_response_bytes: MAX_TRANSACTION_BYTES,
        })
    }

    /// Caps the accepted response body. Defaults to
    /// [`MAX_TRANSACTION_BYTES`].
    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// Full URL of a supplier's transaction endpoint.
    pub fn endpoint(&self, supplier: &str) -> String {
        format!("{}://{}{}", self.scheme, supplier, TRANSACTION_PATH)
    }
}

fn failure(supplier: &str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::SupplierFailure {
        host: supplier.to_string(),
        reason: reason.into(),
    }
}

fn transport_failure(supplier: &str, e: reqwest::Error) -> ProtocolError {
    if e.is_timeout() {
        failure(supplier, FAILED_TIMEOUT)
    } else {
        failure(supplier, e.to_string())
    }
}

#[async_trait]
impl SupplierTransport for HttpTransport {
    async fn post_transaction(
        &self,
        supplier: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut response = self
            .client
            .post(self.endpoint(supplier))
            .header(CONTENT_TYPE, TREE_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_failure(supplier, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(failure(supplier, status.as_u16().to_string()));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_response_bytes as u64)
        {
            return Err(failure(supplier, FAILED_OVERSIZED_RESPONSE));
        }

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_failure(supplier, e))?
        {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(failure(supplier, FAILED_OVERSIZED_RESPONSE));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one connection on loopback: waits for the request body `{}`,
    /// then writes `head` followed by each of `chunks`. Returns the
    /// supplier address.
    async fn serve_once(head: &'static str, chunks: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"{}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            // The client may hang up early; write errors are expected then.
            let _ = socket.write_all(head.as_bytes()).await;
            for chunk in chunks {
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
            }
            let _ = socket.shutdown().await;
        });
        format!("127.0.0.1:{}", addr.port())
    }

    fn chunked(parts: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = parts
            .iter()
            .map(|p| {
                let mut c = format!("{:x}\r\n", p.len()).into_bytes();
                c.extend_from_slice(p);
                c.extend_from_slice(b"\r\n");
                c
            })
            .collect();
        out.push(b"0\r\n\r\n".to_vec());
        out
    }

    fn transport(max: usize) -> HttpTransport {
        HttpTransport::new("http", Duration::from_secs(2))
            .unwrap()
            .with_max_response_bytes(max)
    }

    fn assert_oversized(err: ProtocolError) {
        match err {
            ProtocolError::SupplierFailure { reason, .. } => {
                assert_eq!(reason, FAILED_OVERSIZED_RESPONSE)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn body_within_limit_is_returned() {
        let supplier = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\n",
            vec![b"hello".to_vec()],
        )
        .await;
        let body = transport(64).post_transaction(&supplier, b"{}".to_vec()).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn declared_oversized_body_is_rejected() {
        let supplier = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n",
            vec![vec![b'x'; 100]],
        )
        .await;
        let err = transport(64).post_transaction(&supplier, b"{}".to_vec()).await.unwrap_err();
        assert_oversized(err);
    }

    #[tokio::test]
    async fn streamed_oversized_body_is_rejected() {
        let part = [b'x'; 40];
        let supplier = serve_once(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            chunked(&[&part[..], &part[..], &part[..]]),
        )
        .await;
        let err = transport(64).post_transaction(&supplier, b"{}".to_vec()).await.unwrap_err();
        assert_oversized(err);
    }

    #[test]
    fn endpoint_uses_scheme_and_transaction_path() {
        let t = HttpTransport::new("http", Duration::from_millis(100)).unwrap();
        assert_eq!(t.endpoint("dsp.example:8080"), "http://dsp.example:8080/transaction");
    }

    #[tokio::test]
    async fn unreachable_supplier_is_a_supplier_failure() {
        let t = HttpTransport::new("http", Duration::from_millis(500)).unwrap();
        // Port 9 on loopback is the discard port; nothing listens there.
        let err = t.post_transaction("127.0.0.1:9", b"{}".to_vec()).await.unwrap_err();
        match err {
            ProtocolError::SupplierFailure { host, reason } => {
                assert_eq!(host, "127.0.0.1:9");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
