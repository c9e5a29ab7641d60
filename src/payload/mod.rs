//! Payload selection and splitting
//!
//! After a fetch completes, [`select_payload`] picks the file to deliver from
//! the engine's file list and [`PayloadSplitter`] cuts it into transport-sized
//! parts when it exceeds the upload limit.

mod selector;
mod splitter;

pub use selector::{SelectionPolicy, select_payload};
pub use splitter::{PartFile, PayloadSplitter, split_file};
