//! Mail session abstraction and the IMAP implementation.
//!
//! The pipeline only needs five operations: discover the epoch, list new
//! ids above a watermark, fetch a message (full and headers-only), and move
//! a message to a folder. Every failure is fatal to the run.

pub mod blocking;
pub mod imap;
pub mod message;

pub use blocking::BlockingSession;
pub use imap::ImapSession;
pub use message::{MessageInfo, extract_email_info};

use crate::error::MailError;

/// Message identifier within an epoch (IMAP UID). Strictly increasing, not contiguous.
pub type MessageId = u32;

/// Blocking mail session. One command is outstanding at a time.
/// Async callers go through `BlockingSession`.
pub trait MailSession: Send {
    /// Opaque id of the current mailbox generation (IMAP `UIDVALIDITY`).
    fn epoch(&mut self) -> Result<String, MailError>;

    /// Ids strictly greater than `watermark`, ascending.
    fn list_new_ids(&mut self, watermark: MessageId) -> Result<Vec<MessageId>, MailError>;

    /// Full raw message, without setting `\Seen`.
    fn fetch_full(&mut self, id: MessageId) -> Result<Vec<u8>, MailError>;

    /// Header block only, lossily decoded.
    fn fetch_headers(&mut self, id: MessageId) -> Result<String, MailError>;

    /// Move a message to `folder`. Copy, mark deleted, expunge; not atomic.
    fn move_to(&mut self, id: MessageId, folder: &str) -> Result<(), MailError>;

    /// End the session. Errors are ignored.
    fn logout(&mut self) {}
}
