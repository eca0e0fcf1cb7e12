//! Transpile options and the fixed preset.

/// Options controlling which authoring-dialect features are lowered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOptions {
    /// Call emitted for every element.
    pub factory: String,
    /// Tag used for `<>...</>` fragments.
    pub fragment: String,
    /// Shallow-merge helper used for attribute spreads.
    pub assign: String,
    /// Strip type annotations and type aliases.
    pub erase_types: bool,
    /// Lower component syntax to factory calls.
    pub lower_components: bool,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Preset::standard()
    }
}

impl TranspileOptions {
    /// Options with every feature disabled: output equals input.
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            erase_types: false,
            lower_components: false,
            ..Preset::standard()
        }
    }

    /// Override the element factory.
    #[must_use]
    pub fn factory<S: Into<String>>(mut self, factory: S) -> Self {
        self.factory = factory.into();
        self
    }

    /// Override the fragment tag.
    #[must_use]
    pub fn fragment<S: Into<String>>(mut self, fragment: S) -> Self {
        self.fragment = fragment.into();
        self
    }

    /// Override the spread helper.
    #[must_use]
    pub fn assign<S: Into<String>>(mut self, assign: S) -> Self {
        self.assign = assign.into();
        self
    }

    /// Enable or disable type erasure.
    #[must_use]
    pub const fn erase_types(mut self, enabled: bool) -> Self {
        self.erase_types = enabled;
        self
    }

    /// Enable or disable component lowering.
    #[must_use]
    pub const fn lower_components(mut self, enabled: bool) -> Self {
        self.lower_components = enabled;
        self
    }
}

/// Named option sets.
pub struct Preset;

impl Preset {
    /// Type erasure plus component lowering onto the `UI` runtime global.
    #[must_use]
    pub fn standard() -> TranspileOptions {
        TranspileOptions {
            factory: "UI.createElement".to_string(),
            fragment: "UI.Fragment".to_string(),
            assign: "UI.assign".to_string(),
            erase_types: true,
            lower_components: true,
        }
    }
}
