//! Request and response containers exchanged with the serving host.
//!
//! Both sides carry string properties (headers) and an ordered list of
//! named binary payloads. The host owns their lifecycle: an [`Input`] is
//! consumed by exactly one adapter call and an [`Output`] is handed back
//! for delivery.

mod input;
mod output;

pub use input::Input;
pub use output::Output;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_NPZ: &str = "tensor/npz";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
