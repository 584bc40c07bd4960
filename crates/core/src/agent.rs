//! The Agent trait: the planning half of the loop.
//!
//! An agent looks at the input and at every step taken so far and decides
//! what happens next. The executor owns the loop; the agent only plans.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::RunCancellationToken;
use crate::error::Result;
use crate::step::{PlanOutcome, StepRecord};
use crate::tool::ToolRegistry;

#[async_trait]
pub trait Agent: Send + Sync {
    /// Decide the next move given the steps taken so far.
    async fn plan(
        &self,
        steps: &[StepRecord],
        inputs: &HashMap<String, String>,
        cancel: &RunCancellationToken,
    ) -> Result<PlanOutcome>;

    /// Input variables the caller must supply.
    fn input_keys(&self) -> Vec<String>;

    /// Keys the agent's final answer is returned under.
    fn output_keys(&self) -> Vec<String>;

    /// The tools this agent may propose.
    fn tools(&self) -> Arc<ToolRegistry>;
}
