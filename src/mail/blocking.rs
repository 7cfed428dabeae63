//! Async front for a blocking `MailSession`.
//!
//! Every call moves the session onto the blocking pool with
//! `spawn_blocking` and takes it back when the call returns. Calls are
//! strictly sequential: `&mut self` keeps one request outstanding.

use tracing::warn;

use crate::error::MailError;
use crate::mail::{MailSession, MessageId};

pub struct BlockingSession {
    // Empty only if a call panicked; later calls then report `Closed`.
    inner: Option<Box<dyn MailSession>>,
}

impl BlockingSession {
    pub fn new(session: impl MailSession + 'static) -> Self {
        Self {
            inner: Some(Box::new(session)),
        }
    }

    async fn call<T, F>(&mut self, op: F) -> Result<T, MailError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn MailSession) -> Result<T, MailError> + Send + 'static,
    {
        let mut session = self.inner.take().ok_or(MailError::Closed)?;
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = op(session.as_mut());
            (session, result)
        })
        .await
        .map_err(|e| MailError::TaskPanicked(e.to_string()))?;
        self.inner = Some(session);
        result
    }

    pub async fn epoch(&mut self) -> Result<String, MailError> {
        self.call(|s| s.epoch()).await
    }

    pub async fn list_new_ids(&mut self, watermark: MessageId) -> Result<Vec<MessageId>, MailError> {
        self.call(move |s| s.list_new_ids(watermark)).await
    }

    pub async fn fetch_full(&mut self, id: MessageId) -> Result<Vec<u8>, MailError> {
        self.call(move |s| s.fetch_full(id)).await
    }

    pub async fn fetch_headers(&mut self, id: MessageId) -> Result<String, MailError> {
        self.call(move |s| s.fetch_headers(id)).await
    }

    pub async fn move_to(&mut self, id: MessageId, folder: &str) -> Result<(), MailError> {
        let folder = folder.to_string();
        self.call(move |s| s.move_to(id, &folder)).await
    }

    /// End the session. Errors are logged, not returned.
    pub async fn logout(mut self) {
        if let Err(e) = self
            .call(|s| {
                s.logout();
                Ok(())
            })
            .await
        {
            warn!(error = %e, "Mail logout skipped");
        }
    }
}
