use crate::config::Config;
use crate::run_id::RunId;

/// Placeholder in command templates replaced with the run identifier.
pub const ANALYSIS_ID_PLACEHOLDER: &str = "ANALYSISID";

/// One tool execution request: which image to run and what to run in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: String,
    pub image: String,
    pub custom_image: Option<String>,
    pub cmd: String,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, image: impl Into<String>, cmd: impl Into<String>) -> Self {
        ToolInvocation {
            tool: tool.into(),
            image: image.into(),
            custom_image: None,
            cmd: cmd.into(),
        }
    }

    /// Pick up the per-tool image override from config, if one is set.
    pub fn with_config_overrides(mut self, config: &Config) -> Self {
        if let Some(img) = config.custom_image_for(&self.tool) {
            self.custom_image = Some(img.to_string());
        }
        self
    }

    pub fn effective_image(&self) -> &str {
        match self.custom_image.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => &self.image,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.effective_image().is_empty() || self.cmd.is_empty()
    }
}

pub fn replace_analysis_id(cmd: &str, run_id: &RunId) -> String {
    cmd.replace(ANALYSIS_ID_PLACEHOLDER, &run_id.to_string())
}
