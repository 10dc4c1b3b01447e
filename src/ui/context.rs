//! Terminal detection for console output

use std::io::IsTerminal;

/// Environment variables set by common CI systems
const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// Whether console output may use cliclack decorations
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Decorate only when stdout is a terminal outside CI
    pub fn detect() -> Self {
        let under_ci = CI_MARKERS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            fancy: std::io::stdout().is_terminal() && !under_ci,
        }
    }

    /// Plain bracketed lines, for tests and piped output
    pub fn plain() -> Self {
        Self { fancy: false }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }
}
