pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod graph;
pub mod report;
pub mod scheduler;
pub mod store;

pub use builder::{GraphBuilder, Seed};
pub use config::ExplorerConfig;
pub use error::ExplorerError;
pub use events::{EventBus, ExplorerEvent, Severity};
pub use graph::FlowGraph;
pub use scheduler::FetchScheduler;
pub use store::Database;

/// Startup banner for the CLI.
pub fn print_banner() {
    println!(
        r#"
            _                       _
  ___  ___ | | __ _ _ __ __ _ _ __ | |__
 / __|/ _ \| |/ _` | '__/ _` | '_ \| '_ \
 \__ \ (_) | | (_| | | | (_| | |_) | | | |
 |___/\___/|_|\__, |_|  \__,_| .__/|_| |_|
              |___/          |_|   v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
