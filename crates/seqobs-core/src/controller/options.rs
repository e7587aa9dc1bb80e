/// Per-observation settings.
#[derive(Debug, Clone, Default)]
pub struct ObserveOptions {
    /// Attached to every log line of the observation.
    pub label: Option<String>,
}

impl ObserveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
