//! In-memory supplier transport for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::transport::SupplierTransport;
use crate::error::ProtocolError;

/// Canned answer for one supplier.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// 200 with this body.
    Body(Vec<u8>),
    /// Any other status.
    Status(u16),
    /// Never answers.
    Hang,
}

/// Answers each supplier from a script and counts the calls it receives.
/// Suppliers without a script answer 404.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    replies: HashMap<String, Reply>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, supplier: &str, reply: Reply) -> Self {
        self.replies.insert(supplier.to_string(), reply);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request bodies received so far, with the supplier they were sent to.
    pub(crate) fn bodies(&self) -> Vec<(String, Vec<u8>)> {
        self.bodies.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SupplierTransport for ScriptedTransport {
    async fn post_transaction(
        &self,
        supplier: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, ProtocolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.push((supplier.to_string(), body));
        }

        match self.replies.get(supplier).cloned() {
            Some(Reply::Body(bytes)) => Ok(bytes),
            Some(Reply::Status(code)) => Err(ProtocolError::SupplierFailure {
                host: supplier.to_string(),
                reason: code.to_string(),
            }),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(ProtocolError::SupplierFailure {
                host: supplier.to_string(),
                reason: "404".to_string(),
            }),
        }
    }
}
