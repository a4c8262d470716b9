//! Hub message: a tagged, payload-agnostic frame body.

use bytes::Bytes;

/// Wire kind of a [`Message`], mapped to the WebSocket opcode by the write pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// UTF-8 text frame (JSON payloads from the dashboard)
    Text,
    /// Binary frame (camera frames)
    Binary,
}

/// Immutable payload fanned out to every subscriber of a hub.
///
/// Cloning is cheap: the payload is reference counted, so one message can be
/// queued on every subscriber without copying the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    data: Bytes,
}

impl Message {
    /// Create a text message. The caller guarantees the bytes are valid UTF-8.
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::Text,
            data: data.into(),
        }
    }

    /// Create a binary message.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::Binary,
            data: data.into(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (MessageKind, Bytes) {
        (self.kind, self.data)
    }
}
