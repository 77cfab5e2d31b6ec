//! HAR (HTTP Archive) model and the per-instance entry log.

mod entry;
mod log;
mod types;

pub use log::HarLog;
pub use types::{
    Har, HarCache, HarContent, HarCreator, HarEntry, HarHeader, HarLogData, HarPostData,
    HarQueryParam, HarRequest, HarResponse, HarTimings, HAR_VERSION,
};
