pub mod file;
pub mod grant;
pub mod policy;
pub mod processing;
pub mod task;

pub use file::SourceFile;
pub use grant::{AuthToken, GrantRequest, UploadGrant};
pub use policy::{Policy, Role};
pub use processing::ProcessingEvent;
pub use task::{InvalidTransition, TaskStatus, Transition, UploadTask};
