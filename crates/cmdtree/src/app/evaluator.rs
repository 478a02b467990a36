//! Recursive command tree evaluation.
//!
//! Guarded evaluation ([`run`]) stops at the first branch that executes; exhaustive evaluation
//! ([`execute`]) attempts every branch and collects one outcome per child in declaration order.
//! Both share a single walk parameterized by [`Policy`]. Scope checks are issued parent before
//! child and in sibling order, and a rejected scope prunes its whole subtree.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use serde::{Deserialize, Serialize};

use crate::app::context::ExecutionContext;
use crate::app::fan_out::with_each_selection;
use crate::domain::errors::EvalError;
use crate::domain::model::{CommandNode, Commands, Outcome};

/// Tunables for [`Evaluator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorOptions {
    /// Drive exhaustive siblings concurrently when none of them fans out over selections.
    #[serde(default)]
    pub concurrent_siblings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    FirstExecuted,
    CollectAll,
}

/// Whether a branch reached a command, and what it produced.
#[derive(Debug)]
struct Step {
    executed: bool,
    outcome: Outcome,
}

impl Step {
    fn skipped() -> Self {
        Self {
            executed: false,
            outcome: Outcome::Absent,
        }
    }

    fn executed(outcome: Outcome) -> Self {
        Self {
            executed: true,
            outcome,
        }
    }
}

/// Evaluates command trees against an [`ExecutionContext`].
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    options: EvaluatorOptions,
}

impl Evaluator {
    pub fn new(options: EvaluatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> EvaluatorOptions {
        self.options
    }

    /// Return the outcome of the first command reached, or [`Outcome::Absent`] if every branch
    /// was pruned.
    pub async fn run(
        &self,
        cx: &ExecutionContext<'_>,
        node: &CommandNode,
    ) -> Result<Outcome, EvalError> {
        let step = self.evaluate(cx, node, Policy::FirstExecuted).await?;
        Ok(step.outcome)
    }

    /// Attempt every branch; sequences yield one outcome per child, pruned ones as
    /// [`Outcome::Absent`].
    pub async fn execute(
        &self,
        cx: &ExecutionContext<'_>,
        node: &CommandNode,
    ) -> Result<Outcome, EvalError> {
        let step = self.evaluate(cx, node, Policy::CollectAll).await?;
        Ok(step.outcome)
    }

    fn evaluate<'a>(
        &'a self,
        cx: &'a ExecutionContext<'a>,
        node: &'a CommandNode,
        policy: Policy,
    ) -> BoxFuture<'a, Result<Step, EvalError>> {
        async move {
            if let Some(scope) = node.scope()
                && !cx.check_scope(scope).await?
            {
                tracing::trace!(%scope, "scope rejected branch");
                return Ok(Step::skipped());
            }

            if node.for_each_selection() && cx.selections().len() != 1 {
                let steps =
                    with_each_selection(cx, move || self.evaluate_inner(cx, node, policy)).await?;
                let executed = steps.iter().any(|step| step.executed);
                let outcomes = steps.into_iter().map(|step| step.outcome).collect();
                return Ok(Step {
                    executed,
                    outcome: Outcome::List(outcomes),
                });
            }

            self.evaluate_inner(cx, node, policy).await
        }
        .boxed()
    }

    async fn evaluate_inner(
        &self,
        cx: &ExecutionContext<'_>,
        node: &CommandNode,
        policy: Policy,
    ) -> Result<Step, EvalError> {
        match node {
            CommandNode::Leaf(leaf) => {
                tracing::debug!(command = %leaf.command, "executing command");
                let value = cx.execute(&leaf.command, leaf.args.as_ref()).await?;
                Ok(Step::executed(Outcome::Value(value)))
            }
            CommandNode::Group(group) => match &group.commands {
                Commands::Nested(child) => self.evaluate(cx, child, policy).await,
                Commands::Sequence(children) => match policy {
                    Policy::FirstExecuted => self.first_executed(cx, children).await,
                    Policy::CollectAll => self.collect_all(cx, children).await,
                },
            },
        }
    }

    async fn first_executed(
        &self,
        cx: &ExecutionContext<'_>,
        children: &[CommandNode],
    ) -> Result<Step, EvalError> {
        for child in children {
            let step = self.evaluate(cx, child, Policy::FirstExecuted).await?;
            if step.executed {
                return Ok(step);
            }
        }
        Ok(Step::skipped())
    }

    async fn collect_all(
        &self,
        cx: &ExecutionContext<'_>,
        children: &[CommandNode],
    ) -> Result<Step, EvalError> {
        // Selection state is shared, so anything that fans out must run alone.
        let concurrent =
            self.options.concurrent_siblings && !children.iter().any(CommandNode::uses_fan_out);

        let outcomes = if concurrent {
            let steps = try_join_all(
                children
                    .iter()
                    .map(|child| self.evaluate(cx, child, Policy::CollectAll)),
            )
            .await?;
            steps.into_iter().map(|step| step.outcome).collect()
        } else {
            let mut outcomes = Vec::with_capacity(children.len());
            for child in children {
                outcomes.push(self.evaluate(cx, child, Policy::CollectAll).await?.outcome);
            }
            outcomes
        };

        Ok(Step::executed(Outcome::List(outcomes)))
    }
}

/// Guarded evaluation with default options.
pub async fn run(cx: &ExecutionContext<'_>, node: &CommandNode) -> Result<Outcome, EvalError> {
    Evaluator::default().run(cx, node).await
}

/// Exhaustive evaluation with default options.
pub async fn execute(
    cx: &ExecutionContext<'_>,
    node: &CommandNode,
) -> Result<Outcome, EvalError> {
    Evaluator::default().execute(cx, node).await
}
