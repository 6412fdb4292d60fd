//! Resumable, flow-controlled upload client for the Incoming!! upload
//! server.
//!
//! A file is streamed over a WebSocket in chunks with a bounded number of
//! unacknowledged chunks in flight. Lost connections are retried and the
//! upload resumes from the offset the server reports.
//!
//! [`Session`] holds the protocol state machine and performs no I/O;
//! [`Uploader`] runs sessions on Tokio.

pub mod config;
pub mod error;
pub mod flow;
pub mod observer;
pub(crate) mod pumps;
pub mod retry;
pub mod session;
pub mod types;
pub mod uploader;
pub mod ws_client;

pub use config::UploaderConfig;
pub use error::UploaderError;
pub use observer::{Callbacks, UploadObserver};
pub use session::{Effects, Input, Session};
pub use types::{
    ConnectionId, PauseMode, ReadId, RetryToken, SessionError, SessionSnapshot, UploadState,
};
pub use uploader::{Uploader, UploaderHandle};
pub use ws_client::ChannelError;
