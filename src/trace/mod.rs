// Client-side trace pipeline: spans, batching, delivery, auto-capture

pub mod buffer;
pub mod interceptor;
pub mod manager;
pub mod reporter;
pub mod tracker;
pub mod traced;
pub mod types;

pub use buffer::TraceBuffer;
pub use interceptor::{TraceInterceptor, SPAN_ID_HEADER, TRACE_ID_HEADER};
pub use manager::TraceManager;
pub use reporter::TraceReporter;
pub use tracker::AutoTracker;
pub use traced::traced;
pub use types::{AuditEvent, AuditStage, SpanKind, TraceSpan};
