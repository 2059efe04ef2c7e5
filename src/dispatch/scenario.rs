use super::error::PipelineError;
use super::event::Event;
use super::step::{Hook, Step};

/// A graph of named steps plus the context they share.
///
/// Built once, replayed many times: call [`Scenario::set_initial_step`]
/// before each [`Scenario::play`]. Steps are looked up by name in
/// registration order, so if two steps share a name the first one wins.
pub struct Scenario<C> {
    steps: Vec<Step<C>>,
    context: C,
    current: Option<usize>,
    run_error: Option<PipelineError>,
    on_start: Option<Hook>,
    on_end: Option<Hook>,
}

fn find_step<C>(steps: &[Step<C>], name: &str) -> Option<usize>
where
    C: Send + 'static,
{
    steps.iter().position(|step| step.name() == name)
}

impl<C: Default + Send + 'static> Default for Scenario<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: Send + 'static> Scenario<C> {
    pub fn new(context: C) -> Self {
        Self {
            steps: Vec::new(),
            context,
            current: None,
            run_error: None,
            on_start: None,
            on_end: None,
        }
    }

    /// Register a new step and return it for wiring.
    pub fn step(&mut self, name: impl Into<String>) -> &mut Step<C> {
        self.steps.push(Step::new(name));
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    pub fn on_start<H>(&mut self, hook: H) -> &mut Self
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Fired when a walk reaches its end without error.
    pub fn on_end<H>(&mut self, hook: H) -> &mut Self
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.on_end = Some(Box::new(hook));
        self
    }

    pub fn set_initial_step(&mut self, name: &str) -> Result<(), PipelineError> {
        self.run_error = None;
        self.current = find_step(&self.steps, name);
        match self.current {
            Some(_) => Ok(()),
            None => Err(PipelineError::UndefinedInitialStep(name.to_string())),
        }
    }

    pub fn current_step(&self) -> Option<&Step<C>> {
        self.current.map(|index| &self.steps[index])
    }

    /// Error of the most recent [`Scenario::play`], if it failed.
    pub fn run_error(&self) -> Option<&PipelineError> {
        self.run_error.as_ref()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Walk the graph from the current step until a step has no successor,
    /// its successor is not registered, or a step fails.
    ///
    /// The outcome is reported through [`Scenario::run_error`].
    pub async fn play(&mut self, event: &mut Event) {
        if let Some(hook) = &self.on_start {
            hook();
        }
        self.run_error = None;

        let Some(mut index) = self.current else {
            self.run_error = Some(PipelineError::NoInitialStep);
            return;
        };

        loop {
            let step = &self.steps[index];
            if let Err(err) = step.run(event, &mut self.context).await {
                tracing::debug!(step = %step.name(), error = %err, "step failed, stopping walk");
                self.run_error = Some(err);
                return;
            }

            let Some(next) = step.next() else { break };
            match find_step(&self.steps, next) {
                Some(next_index) => {
                    index = next_index;
                    self.current = Some(index);
                }
                None => {
                    // Stories wire disabled stages to names that are never
                    // registered; that ends the walk cleanly.
                    tracing::debug!(step = %step.name(), next, "successor not registered, walk ends");
                    break;
                }
            }
        }

        if let Some(hook) = &self.on_end {
            hook();
        }
    }
}
