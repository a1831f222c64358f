pub mod decode_error;

pub use decode_error::{CResult, ReError};
