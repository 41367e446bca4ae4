//! Synthetic monitoring engine.
//!
//! Periodically runs user-defined probes against external endpoints,
//! scores every outcome against typed assertions, and folds the results
//! into the TestSuite -> TestCase -> TestStep status tree:
//! - [`scheduler`] buckets steps by frequency into ticker pools
//! - [`executor`] runs one task under a fail-safe deadline
//! - [`assertion`] parses and evaluates assertion expressions
//! - [`status`] ranks and aggregates outcomes
//! - [`probe`] is the pluggable protocol-client contract
//! - [`importer`] builds the tree from definitions and handles reloads
//! - [`sink`] is the alerting/storage collaborator boundary

pub mod assertion;
pub mod duration;
pub mod error;
pub mod executor;
pub mod importer;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod sink;
pub mod status;
pub mod teststruct;

pub use error::ConfigError;
pub use executor::TaskExecutor;
pub use importer::Importer;
pub use probe::ProbeRegistry;
pub use report::{TaskReport, VigieResult};
pub use scheduler::TickerPoolManager;
pub use status::Status;
