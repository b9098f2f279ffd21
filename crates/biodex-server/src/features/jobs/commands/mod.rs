pub mod enqueue;

pub use enqueue::{EnqueueIngestCommand, EnqueueIngestError, EnqueueIngestResponse};
