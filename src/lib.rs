pub mod config;
pub mod model;
pub mod output;
pub mod release;
pub mod salesforce;
pub mod scanner;

pub use config::Config;
pub use model::{Finding, FlowInfo, ScanReport, Severity};
pub use scanner::Dispatcher;
