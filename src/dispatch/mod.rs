pub mod error;
pub mod event;
pub mod scenario;
pub mod step;
pub mod story;

pub use error::PipelineError;
pub use event::Event;
pub use scenario::Scenario;
pub use step::{Action, Step};
pub use story::{DispatchContext, DispatchStory, Notifier, Story};
