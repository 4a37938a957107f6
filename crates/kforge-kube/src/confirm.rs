//! Confirmation before mutating the cluster

use std::io::{self, Write};

use async_trait::async_trait;
use console::{Term, style};

use crate::error::{KubeError, Result};
use crate::plan::Plan;

/// Decides whether a plan may be executed
#[async_trait]
pub trait Confirmation: Send + Sync {
    /// `Ok(true)` to proceed, `Ok(false)` to decline
    async fn confirm(&self, plan: &Plan) -> Result<bool>;
}

/// Approves every plan
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Confirmation for AutoApprove {
    async fn confirm(&self, _plan: &Plan) -> Result<bool> {
        Ok(true)
    }
}

/// Confirmation decided by a closure
pub struct ConfirmFn<F> {
    decide: F,
}

impl<F> ConfirmFn<F>
where
    F: Fn(&Plan) -> bool + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

#[async_trait]
impl<F> Confirmation for ConfirmFn<F>
where
    F: Fn(&Plan) -> bool + Send + Sync,
{
    async fn confirm(&self, plan: &Plan) -> Result<bool> {
        Ok((self.decide)(plan))
    }
}

/// Interactive yes/no prompt on the terminal
///
/// Declines when stderr is not a terminal, so unattended runs never mutate
/// without `--yes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirmation;

#[async_trait]
impl Confirmation for TerminalConfirmation {
    async fn confirm(&self, plan: &Plan) -> Result<bool> {
        let term = Term::stderr();
        if !term.is_term() {
            tracing::warn!("not running in a terminal, declining apply (use --yes to skip confirmation)");
            return Ok(false);
        }

        let summary = plan.summary();
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let _ = write!(
                io::stderr(),
                "\n{} Apply these changes ({})? [y/N] ",
                style("?").cyan().bold(),
                summary
            );
            let _ = io::stderr().flush();
            term.read_line()
        })
        .await
        .map_err(|e| KubeError::Confirmation(e.to_string()))??;

        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}
