//! The three user-authored source fragments.

use serde::{Deserialize, Serialize};

use crate::HostMessage;

/// Which editor pane a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// Script in the authoring dialect.
    Script,
    /// Stylesheet text.
    Style,
    /// Body markup.
    Markup,
}

impl FragmentKind {
    /// All kinds, in handshake answer order (static fragments first).
    pub const ALL: [Self; 3] = [Self::Markup, Self::Style, Self::Script];

    /// Whether this fragment is answered by a `request_default_static` signal.
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(self, Self::Style | Self::Markup)
    }
}

/// A single fragment with its current text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl Fragment {
    /// Create a fragment.
    #[must_use]
    pub fn new(kind: FragmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// The host-to-context message carrying this fragment.
    #[must_use]
    pub fn to_message(&self) -> HostMessage {
        match self.kind {
            FragmentKind::Script => HostMessage::Code(self.text.clone()),
            FragmentKind::Style => HostMessage::Css(self.text.clone()),
            FragmentKind::Markup => HostMessage::Html(self.text.clone()),
        }
    }
}

/// One text per fragment kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragments {
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub markup: String,
}

impl Fragments {
    /// Text of the given fragment.
    #[must_use]
    pub fn get(&self, kind: FragmentKind) -> &str {
        match kind {
            FragmentKind::Script => &self.script,
            FragmentKind::Style => &self.style,
            FragmentKind::Markup => &self.markup,
        }
    }

    /// Replace the text of the given fragment, returning whether it changed.
    pub fn set(&mut self, kind: FragmentKind, text: impl Into<String>) -> bool {
        let slot = match kind {
            FragmentKind::Script => &mut self.script,
            FragmentKind::Style => &mut self.style,
            FragmentKind::Markup => &mut self.markup,
        };
        let text = text.into();
        if *slot == text {
            return false;
        }
        *slot = text;
        true
    }

    /// The fragment of the given kind as an owned value.
    #[must_use]
    pub fn fragment(&self, kind: FragmentKind) -> Fragment {
        Fragment::new(kind, self.get(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_changes_only() {
        let mut fragments = Fragments::default();
        assert!(fragments.set(FragmentKind::Style, "body { color: red }"));
        assert!(!fragments.set(FragmentKind::Style, "body { color: red }"));
        assert_eq!(fragments.get(FragmentKind::Style), "body { color: red }");
        assert_eq!(fragments.get(FragmentKind::Script), "");
    }

    #[test]
    fn fragment_maps_to_matching_message() {
        let msg = Fragment::new(FragmentKind::Markup, "<p>hi</p>").to_message();
        assert_eq!(msg, HostMessage::Html("<p>hi</p>".into()));
        assert_eq!(msg.kind(), FragmentKind::Markup);
    }

    #[test]
    fn static_kinds() {
        assert!(FragmentKind::Style.is_static());
        assert!(FragmentKind::Markup.is_static());
        assert!(!FragmentKind::Script.is_static());
    }
}
