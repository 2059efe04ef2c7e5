/// Unit of work flowing through a scenario walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// A URI, rewritten by stages as it moves through the pipeline.
    pub value: String,
    /// Tag of the stage (or submitter) that last produced `value`.
    pub origin: String,
}

impl Event {
    pub fn new(origin: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: origin.into(),
        }
    }
}
