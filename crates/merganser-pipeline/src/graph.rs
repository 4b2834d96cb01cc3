//! Declarative task-graph wiring.
//!
//! A pipeline is declared as named steps with explicit dependencies — a
//! partial order, not threads. The builder validates the declaration
//! (duplicate ids, unknown dependencies, cycles) and precomputes
//! topological waves; every step within a wave may execute concurrently.

use thiserror::Error;

pub type StepId = &'static str;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("duplicate step id: {0}")]
  DuplicateStep(StepId),

  #[error("step {step} depends on unknown step {dep}")]
  UnknownDependency { step: StepId, dep: StepId },

  #[error("dependency cycle involving steps: {0:?}")]
  Cycle(Vec<StepId>),
}

// ─── Graph ───────────────────────────────────────────────────────────────────

/// A named step plus its dependencies and an arbitrary payload describing
/// what the step does.
#[derive(Debug, Clone)]
pub struct Step<K> {
  pub id:      StepId,
  pub deps:    Vec<StepId>,
  pub payload: K,
}

/// A validated DAG of steps, in declaration order.
#[derive(Debug, Clone)]
pub struct TaskGraph<K> {
  steps: Vec<Step<K>>,
  /// Topological layers as indexes into `steps`.
  waves: Vec<Vec<usize>>,
}

impl<K> TaskGraph<K> {
  pub fn builder() -> TaskGraphBuilder<K> {
    TaskGraphBuilder { steps: Vec::new() }
  }

  pub fn steps(&self) -> &[Step<K>] {
    &self.steps
  }

  /// Steps grouped into execution waves: a step appears in the first wave
  /// after all of its dependencies, and steps sharing a wave are mutually
  /// independent. Wave membership preserves declaration order.
  pub fn waves(&self) -> impl Iterator<Item = Vec<&Step<K>>> + '_ {
    self
      .waves
      .iter()
      .map(|wave| wave.iter().map(|&i| &self.steps[i]).collect())
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

pub struct TaskGraphBuilder<K> {
  steps: Vec<Step<K>>,
}

impl<K> TaskGraphBuilder<K> {
  pub fn step(mut self, id: StepId, deps: &[StepId], payload: K) -> Self {
    self.steps.push(Step { id, deps: deps.to_vec(), payload });
    self
  }

  /// Validate the declaration and compute execution waves.
  pub fn build(self) -> Result<TaskGraph<K>, GraphError> {
    let steps = self.steps;

    for (i, step) in steps.iter().enumerate() {
      if steps[..i].iter().any(|s| s.id == step.id) {
        return Err(GraphError::DuplicateStep(step.id));
      }
      for &dep in &step.deps {
        if !steps.iter().any(|s| s.id == dep) {
          return Err(GraphError::UnknownDependency { step: step.id, dep });
        }
      }
    }

    // Kahn's algorithm, layered: each pass takes every step whose
    // dependencies are already placed. An empty pass with steps left over
    // means a cycle.
    let mut placed = vec![false; steps.len()];
    let mut waves: Vec<Vec<usize>> = Vec::new();
    let mut remaining = steps.len();

    while remaining > 0 {
      let wave: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(i, step)| {
          !placed[*i]
            && step.deps.iter().all(|d| {
              steps
                .iter()
                .position(|s| s.id == *d)
                .is_some_and(|j| placed[j])
            })
        })
        .map(|(i, _)| i)
        .collect();

      if wave.is_empty() {
        let stuck: Vec<StepId> = steps
          .iter()
          .enumerate()
          .filter(|(i, _)| !placed[*i])
          .map(|(_, s)| s.id)
          .collect();
        return Err(GraphError::Cycle(stuck));
      }

      for &i in &wave {
        placed[i] = true;
      }
      remaining -= wave.len();
      waves.push(wave);
    }

    Ok(TaskGraph { steps, waves })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(wave: Vec<&Step<()>>) -> Vec<StepId> {
    wave.into_iter().map(|s| s.id).collect()
  }

  #[test]
  fn waves_follow_dependencies() {
    let graph = TaskGraph::builder()
      .step("a", &[], ())
      .step("b", &["a"], ())
      .step("c", &["a"], ())
      .step("d", &["b", "c"], ())
      .build()
      .unwrap();

    let waves: Vec<Vec<StepId>> = graph.waves().map(ids).collect();
    assert_eq!(waves, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
  }

  #[test]
  fn duplicate_step_rejected() {
    let err = TaskGraph::builder()
      .step("a", &[], ())
      .step("a", &[], ())
      .build()
      .unwrap_err();
    assert_eq!(err, GraphError::DuplicateStep("a"));
  }

  #[test]
  fn unknown_dependency_rejected() {
    let err = TaskGraph::builder()
      .step("a", &["ghost"], ())
      .build()
      .unwrap_err();
    assert_eq!(err, GraphError::UnknownDependency { step: "a", dep: "ghost" });
  }

  #[test]
  fn cycle_rejected() {
    let err = TaskGraph::builder()
      .step("a", &["b"], ())
      .step("b", &["a"], ())
      .build()
      .unwrap_err();
    match err {
      GraphError::Cycle(stuck) => {
        assert_eq!(stuck, vec!["a", "b"]);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn independent_steps_share_the_first_wave() {
    let graph = TaskGraph::builder()
      .step("x", &[], ())
      .step("y", &[], ())
      .build()
      .unwrap();

    let waves: Vec<Vec<StepId>> = graph.waves().map(ids).collect();
    assert_eq!(waves, vec![vec!["x", "y"]]);
  }
}
