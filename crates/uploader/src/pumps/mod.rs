//! Tasks that move frames between a WebSocket and the session.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
