use anyhow::{Context, Result};
use serde::Serialize;
use vmprov_core::customization::ProvisioningResult;
use vmprov_core::error::CompileError;

use crate::ui;

/// Which part of a compile result to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultView {
    /// The full consolidated result.
    #[default]
    Full,
    /// Guest customization payload only.
    Customization,
    /// VM hardware config payload only.
    ConfigSpec,
}

impl ResultView {
    pub fn from_flags(customization: bool, config_spec: bool) -> Self {
        if customization {
            Self::Customization
        } else if config_spec {
            Self::ConfigSpec
        } else {
            Self::Full
        }
    }
}

pub fn to_pretty_json<T: Serialize>(item: &T) -> Result<String> {
    serde_json::to_string_pretty(item).context("Failed to serialize output")
}

pub fn render_json<T: Serialize>(item: &T) -> Result<()> {
    println!("{}", to_pretty_json(item)?);
    Ok(())
}

pub fn render_result(result: &ProvisioningResult, view: ResultView) -> Result<()> {
    match view {
        ResultView::Full => render_json(result),
        ResultView::Customization => render_json(&result.customization_spec()),
        ResultView::ConfigSpec => render_json(&result.config_spec()),
    }
}

/// Print stage, kind, and offending fields of a failed compile.
pub fn render_failure(err: &CompileError) {
    let report = err.report();
    ui::error(&format!("{} stage failed", report.stage));
    ui::detail("kind", &report.kind.to_string());
    if !report.fields.is_empty() {
        ui::detail("fields", &report.fields.join(", "));
    }
    ui::detail("message", &report.message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmprov_core::error::{Stage, StageError};

    #[test]
    fn test_result_view_from_flags() {
        assert_eq!(ResultView::from_flags(false, false), ResultView::Full);
        assert_eq!(ResultView::from_flags(true, false), ResultView::Customization);
        assert_eq!(ResultView::from_flags(false, true), ResultView::ConfigSpec);
    }

    #[test]
    fn test_to_pretty_json() {
        let err = StageError::Validation {
            fields: vec!["IP".to_string()],
        }
        .at(Stage::Network);
        let json = to_pretty_json(&err.report()).unwrap();
        assert!(json.contains("\"stage\": \"network\""));
        assert!(json.contains("\"IP\""));
    }

    #[test]
    fn test_render_failure_does_not_panic() {
        let err = StageError::Cancelled.at(Stage::Storage);
        render_failure(&err);
    }
}
