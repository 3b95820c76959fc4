pub mod buffer;
pub mod config;
pub mod decoder;
pub mod dump;
pub mod error;
pub mod policy;
pub mod pool;
pub mod segment;
pub mod sink;
pub mod source;
pub mod types;

pub use buffer::{BufferMetrics, EventWindowBuffer};
pub use config::PoolConfig;
pub use decoder::{Decoded, Gl1Decoder, DEFAULT_GL1_PACKET_ID, GL1_PAYLOAD_LEN};
pub use error::{DecodeError, Gl1Error, Result};
pub use policy::{FillPolicy, LookaheadPolicy};
pub use pool::{DescribeScope, Gl1TriggerInput, PoolStats};
pub use segment::{SegmentReader, SegmentWriter};
pub use sink::{CollectingSink, JsonLinesSink, PacketSink};
pub use source::{create_source, FileListSource, MemorySource, RawEventSource, SourceConfig};
pub use types::*;
