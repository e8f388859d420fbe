//! Session lifecycle and the parse -> enrich -> store -> embed pipeline
//! (§4.6): `IngestionCoordinator` is the sole entry point other crates call.

pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod upload;

pub use coordinator::IngestionCoordinator;
pub use dispatch::{BrokerClient, BrokerDispatch, InProcessDispatch, JobDispatch, PipelineRun, ProcessProjectPayload};
pub use error::{IngestError, IngestResult};
pub use pipeline::PipelineRunner;
