// Core modules implementing the on-disk format, codecs, and error modeling.
pub mod codec;
pub mod column;
pub mod error;
pub mod format;
pub mod layout;
pub mod plan;
pub mod reader;
pub mod resolve;
pub mod writer;
