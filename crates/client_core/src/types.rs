use shared::domain::ExtensionName;

/// Everything the rendering collaborator needs to redraw the admin page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionView {
    /// Custom extensions in insertion order, one tag each.
    pub tags: Vec<ExtensionName>,
    /// `"count/max"`, e.g. `"1/200"`.
    pub count_display: String,
    pub add_enabled: bool,
    /// Every fixed vocabulary entry with its checkbox state.
    pub checkboxes: Vec<(ExtensionName, bool)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    ViewUpdated(ExtensionView),
    FixedCheckboxChanged { name: ExtensionName, checked: bool },
    /// Blocking notification for the user.
    Notice(String),
    /// The pending file selection must be dropped.
    SelectionCleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    Added(ExtensionName),
    /// The store accepted the name after the list had filled. It is blocked
    /// but not shown until the next snapshot, and the draft is kept.
    Unlisted(ExtensionName),
}
