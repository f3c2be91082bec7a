use std::collections::HashMap;

use crate::error::WorkflowError;
use crate::step::{Step, StepKind};

/// A workflow definition: a start step plus steps linked by id.
#[derive(Debug, Clone)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  pub start: String,
  pub steps: HashMap<String, Step>,
}

impl Workflow {
  pub fn new(
    workflow_id: impl Into<String>,
    name: impl Into<String>,
    start: impl Into<String>,
  ) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      name: name.into(),
      start: start.into(),
      steps: HashMap::new(),
    }
  }

  /// Add a step, builder-style.
  pub fn with_step(mut self, step: Step) -> Self {
    self.steps.insert(step.id.clone(), step);
    self
  }

  /// Get a step by id.
  pub fn get_step(&self, step_id: &str) -> Option<&Step> {
    self.steps.get(step_id)
  }

  /// Check that the start step and every referenced target exist.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    self.check_target(&self.start)?;

    for step in self.steps.values() {
      if let Some(next) = &step.next {
        self.check_target(next)?;
      }
      if let StepKind::Choice { branches, otherwise } = &step.kind {
        if branches.is_empty() {
          return Err(WorkflowError::InvalidDefinition {
            message: format!(
              "choice step '{}' in workflow '{}' has no branches",
              step.id, self.workflow_id
            ),
          });
        }
        for branch in branches {
          self.check_target(&branch.then)?;
        }
        if let Some(otherwise) = otherwise {
          self.check_target(otherwise)?;
        }
      }
    }

    Ok(())
  }

  fn check_target(&self, step_id: &str) -> Result<(), WorkflowError> {
    if self.steps.contains_key(step_id) {
      Ok(())
    } else {
      Err(WorkflowError::UnknownStep {
        workflow_id: self.workflow_id.clone(),
        step_id: step_id.to_string(),
      })
    }
  }
}
