// Resolution strategies

pub mod extraction;
pub mod local;
pub mod metadata;
pub mod proxy;

pub use extraction::{ExtractionStrategy, YtDlpExtractor};
pub use local::LocalFileStrategy;
pub use metadata::{select_best_stream, MetadataApiStrategy};
pub use proxy::ProxyStrategy;
