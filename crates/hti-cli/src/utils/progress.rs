use hti::core::stage::Stage;
use hti::engine::progress::{Progress, ProgressSink};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Stderr progress display for a job.
///
/// Workflow steps spin under their name. A stage gets a bar with one tick per lambda
/// point, labelled with the stage and the coupling value handled last.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<BarState>>,
}

struct BarState {
    pb: ProgressBar,
    label: String,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr()))
    }

    fn with_bar(pb: ProgressBar) -> Self {
        pb.finish_and_clear();
        Self {
            state: Arc::new(Mutex::new(BarState {
                pb,
                label: String::new(),
            })),
        }
    }

    pub fn sink(&self) -> ProgressSink<'static> {
        let state = self.state.clone();
        Box::new(move |event: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };
            state.apply(event);
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn stage_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<22} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-")
    }
}

impl BarState {
    fn apply(&mut self, event: Progress) {
        let pb = &self.pb;
        match event {
            Progress::StepStarted { name } => {
                pb.reset();
                pb.unset_length();
                pb.set_style(CliProgressHandler::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                self.label = name.to_string();
                pb.set_message(self.label.clone());
            }
            Progress::StageStarted { stage, lambdas } => {
                pb.disable_steady_tick();
                pb.reset();
                pb.set_length(lambdas as u64);
                pb.set_style(CliProgressHandler::stage_style());
                self.label = stage.name().to_string();
                pb.set_message(self.label.clone());
            }
            Progress::LambdaDone { stage, lambda, .. } => {
                pb.inc(1);
                pb.set_message(lambda_label(stage, lambda));
            }
            Progress::Finished => {
                pb.disable_steady_tick();
                pb.finish_with_message(format!("{} done", self.label));
            }
            Progress::Note(msg) => {
                pb.println(format!("  {}", msg));
            }
        }
    }
}

fn lambda_label(stage: Stage, lambda: f64) -> String {
    format!("{} λ={:.4}", stage.name(), lambda)
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn hidden_handler() -> CliProgressHandler {
        CliProgressHandler::with_bar(ProgressBar::hidden())
    }

    #[test]
    fn handler_starts_finished() {
        let handler = hidden_handler();
        assert!(handler.state.lock().unwrap().pb.is_finished());
    }

    #[test]
    fn stage_bar_counts_lambda_points_and_names_the_last_one() {
        let handler = hidden_handler();
        let sink = handler.sink();

        sink(Progress::StageStarted {
            stage: Stage::DeepOn,
            lambdas: 4,
        });
        sink(Progress::LambdaDone {
            stage: Stage::DeepOn,
            index: 2,
            lambda: 0.75,
        });
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.pb.length(), Some(4));
            assert_eq!(state.pb.position(), 1);
            assert_eq!(state.pb.message(), "deep_on λ=0.7500");
        }

        sink(Progress::Finished);
        let state = handler.state.lock().unwrap();
        assert!(state.pb.is_finished());
        assert_eq!(state.pb.message(), "deep_on done");
    }

    #[test]
    fn step_resets_a_previous_stage_bar() {
        let handler = hidden_handler();
        let sink = handler.sink();

        sink(Progress::StageStarted {
            stage: Stage::SoftOn,
            lambdas: 3,
        });
        sink(Progress::LambdaDone {
            stage: Stage::SoftOn,
            index: 0,
            lambda: 0.0,
        });
        sink(Progress::StepStarted { name: "End State" });

        let state = handler.state.lock().unwrap();
        assert_eq!(state.pb.position(), 0);
        assert_eq!(state.pb.length(), None);
        assert_eq!(state.pb.message(), "End State");
    }

    #[test]
    fn sink_can_be_driven_from_worker_threads() {
        let handler = hidden_handler();
        let sink = handler.sink();

        thread::spawn(move || {
            sink(Progress::StageStarted {
                stage: Stage::SoftOff,
                lambdas: 2,
            });
            sink(Progress::LambdaDone {
                stage: Stage::SoftOff,
                index: 1,
                lambda: 1.0,
            });
            sink(Progress::Finished);
        })
        .join()
        .unwrap();

        let state = handler.state.lock().unwrap();
        assert!(state.pb.is_finished());
        assert_eq!(state.pb.message(), "soft_off done");
    }
}
