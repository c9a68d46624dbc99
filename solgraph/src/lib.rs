// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    load_endpoints_from_file,
    load_endpoints_from_source,
    parse_endpoint_line,
};

// Re-export the engine surface from solgraph-core
pub use solgraph_core::builder::{GraphBuilder, Seed};
pub use solgraph_core::report::generate_graph_report;
