mod address;
mod cli;

pub use address::{verify, ContentAddress, GIT_RAW_CODEC, SHA1_CODE};
pub use cli::{CliFlavor, IpfsCli};
