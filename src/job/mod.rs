mod model;
mod status;

pub use model::{
    ArtifactLink, GenerationJob, JobId, JobInput, ResourceType, StartedJob, StatusSnapshot,
};
pub use status::{JobStatus, ObservedStatus, StatusClass, UnknownStatus};
