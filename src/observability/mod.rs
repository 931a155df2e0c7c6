pub mod tracer;

pub use tracer::{Span, SpanId, Tracer};
