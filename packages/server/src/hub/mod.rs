//! WebSocket broadcast hub.
//!
//! A [`Hub`] fans every broadcast message out to its registered
//! [`Subscriber`]s and evicts subscribers that cannot keep up. Each hub
//! carries one stream (status, logs, camera) and knows nothing about the
//! payloads it carries.

#[allow(clippy::module_inception)]
mod hub;
mod subscriber;

pub use hub::{BROADCAST_BUFFER, Hub, SEND_BUFFER, SubscriberId};
pub use subscriber::{MAX_MESSAGE_SIZE, PING_PERIOD, PONG_WAIT, Subscriber, WRITE_WAIT};
