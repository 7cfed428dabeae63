//! Subject/sender extraction from a raw message.

use mail_parser::MessageParser;

const NO_SUBJECT: &str = "(No Subject)";
const UNKNOWN_SENDER: &str = "(Unknown)";

/// Display fields for a message. Encoded words are already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub subject: String,
    /// `Name <addr>` when a display name exists, otherwise the bare address.
    pub from: String,
}

/// Extract subject and sender. Never fails: unparsable input gets placeholders.
pub fn extract_email_info(raw: &[u8]) -> MessageInfo {
    let Some(parsed) = MessageParser::default().parse(raw) else {
        return MessageInfo {
            subject: NO_SUBJECT.to_string(),
            from: UNKNOWN_SENDER.to_string(),
        };
    };

    let subject = parsed
        .subject()
        .map(str::to_string)
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let from = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| match (a.name(), a.address()) {
            (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
            (None, Some(address)) => Some(address.to_string()),
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        })
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    MessageInfo { subject, from }
}
