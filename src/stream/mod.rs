pub mod buffer;
pub mod error;
pub mod join;
pub mod parser;
pub mod record;
pub mod source;

pub use buffer::RollingBuffer;
pub use error::{Rejection, StreamError};
pub use join::{ChannelJoin, JoinedPoint};
pub use parser::{parse_line, ProtocolConfig};
pub use record::{EnvReading, Record};
pub use source::{LineSource, ManualSource, ProcessSource};
