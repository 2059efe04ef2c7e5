use super::error::PipelineError;
use super::event::Event;
use anyhow::Result;
use async_trait::async_trait;

pub type Predicate<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;
pub type Hook = Box<dyn Fn() + Send + Sync>;

/// Work performed by a step. Stages that talk to a backend implement this
/// directly; plain closures go through [`Step::run_fn`].
#[async_trait]
pub trait Action<C>: Send + Sync {
    async fn run(&self, event: &mut Event, ctx: &mut C) -> Result<()>;
}

struct FnAction<F>(F);

#[async_trait]
impl<C, F> Action<C> for FnAction<F>
where
    C: Send,
    F: Fn(&mut Event, &mut C) -> Result<()> + Send + Sync,
{
    async fn run(&self, event: &mut Event, ctx: &mut C) -> Result<()> {
        (self.0)(event, ctx)
    }
}

/// A named node of a scenario. The successor is stored by name and only
/// resolved while the scenario is walking.
pub struct Step<C> {
    name: String,
    next: Option<String>,
    action: Option<Box<dyn Action<C>>>,
    predicate: Option<Predicate<C>>,
    on_start: Option<Hook>,
    on_end: Option<Hook>,
}

impl<C: Send + 'static> Step<C> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next: None,
            action: None,
            predicate: None,
            on_start: None,
            on_end: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Set the successor. An empty name leaves the step terminal.
    pub fn to(&mut self, next: impl Into<String>) -> &mut Self {
        let next = next.into();
        self.next = if next.is_empty() { None } else { Some(next) };
        self
    }

    pub fn action(&mut self, action: impl Action<C> + 'static) -> &mut Self {
        self.action = Some(Box::new(action));
        self
    }

    pub fn run_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Event, &mut C) -> Result<()> + Send + Sync + 'static,
    {
        self.action(FnAction(f))
    }

    /// Gate the step. The predicate is checked on every run, against the
    /// context as left by the steps before it.
    pub fn when<P>(&mut self, predicate: P) -> &mut Self
    where
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn on_start<H>(&mut self, hook: H) -> &mut Self
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Fired only after the action succeeded.
    pub fn on_end<H>(&mut self, hook: H) -> &mut Self
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.on_end = Some(Box::new(hook));
        self
    }

    pub async fn run(&self, event: &mut Event, ctx: &mut C) -> Result<(), PipelineError> {
        if let Some(predicate) = &self.predicate {
            if !predicate(ctx) {
                tracing::trace!(step = %self.name, "predicate false, skipping step");
                return Ok(());
            }
        }

        if let Some(hook) = &self.on_start {
            hook();
        }

        let Some(action) = &self.action else {
            return Err(PipelineError::NothingToDo(self.name.clone()));
        };
        action.run(event, ctx).await?;

        if let Some(hook) = &self.on_end {
            hook();
        }
        Ok(())
    }
}
