use thiserror::Error;

/// Failure of a scenario walk.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no initial step provided")]
    NoInitialStep,

    #[error("undefined initial step `{0}`")]
    UndefinedInitialStep(String),

    #[error("nothing to do in step `{0}`")]
    NothingToDo(String),

    /// A stage action failed (backend call, missing client, ...).
    #[error(transparent)]
    Action(#[from] anyhow::Error),
}

impl PipelineError {
    /// True for wiring mistakes, as opposed to a stage failing at run time.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, PipelineError::Action(_))
    }
}
