// (c) 2024 Ross Younger
//! Client-side operations
//!
//! The client connects once, then fetches each named file in turn over that connection.
//! The first failure abandons the whole batch.

mod main_loop;
pub use main_loop::{client_main, fetch_all, BatchError};

mod options;
pub use options::Parameters;

pub(crate) mod progress;
pub(crate) use progress::MAX_UPDATE_FPS;

mod request;
pub use request::{FileRequest, RequestState};

mod summary;
pub use summary::TransferSummary;
