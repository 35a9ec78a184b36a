use crate::core::stage::Stage;

/// Events emitted while a job is generated or analyzed.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// A workflow step that is not tied to a stage, e.g. validation.
    StepStarted { name: &'static str },
    /// Work on one alchemical stage begins.
    StageStarted { stage: Stage, lambdas: usize },
    /// One lambda point of the current stage was written or analyzed.
    LambdaDone { stage: Stage, index: usize, lambda: f64 },
    /// Closes the innermost open step or stage.
    Finished,
    Note(String),
}

pub type ProgressSink<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards [`Progress`] events to an optional sink; silent without one.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    sink: Option<ProgressSink<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn silent() -> Self {
        Self { sink: None }
    }

    pub fn with_sink(sink: ProgressSink<'a>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn emit(&self, event: Progress) {
        if let Some(sink) = &self.sink {
            sink(event);
        }
    }

    pub fn step(&self, name: &'static str) {
        self.emit(Progress::StepStarted { name });
    }

    pub fn stage(&self, stage: Stage, lambdas: usize) {
        self.emit(Progress::StageStarted { stage, lambdas });
    }

    pub fn lambda_done(&self, stage: Stage, index: usize, lambda: f64) {
        self.emit(Progress::LambdaDone {
            stage,
            index,
            lambda,
        });
    }

    pub fn finished(&self) {
        self.emit(Progress::Finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn silent_reporter_drops_events() {
        let reporter = ProgressReporter::silent();
        reporter.lambda_done(Stage::SoftOn, 0, 0.0);
        reporter.finished();
    }

    #[test]
    fn stage_events_carry_lambda_context() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_sink(Box::new(|event| {
            seen.lock().unwrap().push(event);
        }));
        reporter.stage(Stage::DeepOn, 2);
        reporter.lambda_done(Stage::DeepOn, 1, 0.75);
        reporter.finished();
        drop(reporter);

        assert_eq!(
            seen.into_inner().unwrap(),
            vec![
                Progress::StageStarted {
                    stage: Stage::DeepOn,
                    lambdas: 2
                },
                Progress::LambdaDone {
                    stage: Stage::DeepOn,
                    index: 1,
                    lambda: 0.75
                },
                Progress::Finished,
            ]
        );
    }
}
