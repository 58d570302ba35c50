pub mod config;
pub mod error;
pub mod pipeline;
pub mod task;

pub use config::{load_dotenv, SchedulerConfig};
pub use error::*;
pub use pipeline::*;
pub use task::*;
