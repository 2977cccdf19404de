//! Locator and element-handle types, in priority order from most to least
//! stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorType {
    // Priority 1: semantic
    Role,
    AriaLabel,
    AriaLabelledBy,
    // Priority 2: test ids
    TestId,
    AutomationId,
    // Priority 3: text / scoped attributes
    TextExact,
    TextContains,
    Placeholder,
    Title,
    // Priority 4: structural
    Id,
    Name,
    Css,
    Xpath,
}

impl LocatorType {
    #[must_use]
    pub fn is_xpath(self) -> bool {
        matches!(self, Self::Xpath)
    }

    #[must_use]
    pub fn is_text_based(self) -> bool {
        matches!(self, Self::TextExact | Self::TextContains)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorType,
    pub value: String,
    /// An ordered scope chain: when set, this locator is resolved within
    /// the element the scope locator resolves to (which may itself carry
    /// a further scope, nesting outward).
    pub scope: Option<Box<Locator>>,
    /// A CSS selector for the iframe this locator must be resolved
    /// inside, rather than the current frame.
    pub frame: Option<String>,
    pub timeout_ms: u64,
    pub description: String,
}

impl Locator {
    fn new(kind: LocatorType, value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            scope: None,
            frame: None,
            timeout_ms: 10_000,
            description: description.into(),
        }
    }

    /// Scopes this locator to resolve within whatever `scope` itself
    /// resolves to, forming an inner-to-outer chain when nested.
    #[must_use]
    pub fn scoped_within(mut self, scope: Locator) -> Self {
        self.scope = Some(Box::new(scope));
        self
    }

    /// Resolves this locator inside the iframe matched by `frame_selector`
    /// (a CSS selector for the `<iframe>`/`<frame>` element) rather than
    /// the current frame.
    #[must_use]
    pub fn within_frame(mut self, frame_selector: impl Into<String>) -> Self {
        self.frame = Some(frame_selector.into());
        self
    }

    /// The CSS selector this locator compiles to, for the locator types
    /// that `DOM.querySelector[All]` can resolve directly. Text and XPath
    /// locators are resolved in JS instead — see [`super::core::SelectorEngine`].
    #[must_use]
    pub fn to_css_selector(&self) -> Option<String> {
        let escaped = escape_attr_value(&self.value);
        match self.kind {
            LocatorType::Role => Some(format!(r#"[role="{escaped}"]"#)),
            LocatorType::AriaLabel => Some(format!(r#"[aria-label*="{escaped}"]"#)),
            LocatorType::AriaLabelledBy => Some(format!(r#"[aria-labelledby="{escaped}"]"#)),
            LocatorType::TestId => Some(format!(r#"[data-testid="{escaped}"]"#)),
            LocatorType::AutomationId => Some(format!(r#"[data-automation-id="{escaped}"]"#)),
            LocatorType::Id => Some(format!("#{escaped}")),
            LocatorType::Name => Some(format!(r#"[name="{escaped}"]"#)),
            LocatorType::Placeholder => Some(format!(r#"[placeholder*="{escaped}"]"#)),
            LocatorType::Title => Some(format!(r#"[title*="{escaped}"]"#)),
            LocatorType::Css => Some(self.value.clone()),
            LocatorType::Xpath | LocatorType::TextExact | LocatorType::TextContains => None,
        }
    }
}

/// Rudimentary quote/backslash escaping for values embedded in a CSS
/// attribute-selector string literal built on our own side. Note this is
/// distinct from the out-of-band JS argument passing used for anything
/// that crosses into an evaluated script body — CSS selector strings
/// passed to `DOM.querySelector` never execute as code, so string
/// construction here is safe.
fn escape_attr_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, Default)]
pub struct FrameContext {
    pub frame_id: Option<String>,
    pub frame_selector: Option<String>,
    pub is_main_frame: bool,
    /// The `nodeId` of this frame's own document, used as the DOM-domain
    /// resolution root instead of the top-level document's. `None` means
    /// "use the main document" (the main-frame context).
    pub document_node_id: Option<i64>,
    /// The isolated-world `executionContextId` created for this frame,
    /// used to run locator scripts (`Runtime.callFunctionOn`) against the
    /// frame's own document rather than the main frame's globals.
    pub execution_context_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ElementHandle {
    pub node_id: i64,
    pub object_id: Option<String>,
    pub locator: Locator,
    pub frame_context: FrameContext,
    pub found_at: DateTime<Utc>,
}

impl ElementHandle {
    #[must_use]
    pub fn is_stale(&self, max_age_ms: i64) -> bool {
        (Utc::now() - self.found_at).num_milliseconds() > max_age_ms
    }
}

macro_rules! locator_ctor {
    ($name:ident, $kind:expr, $desc:literal) => {
        #[must_use]
        pub fn $name(value: impl Into<String>) -> Locator {
            let value = value.into();
            Locator::new($kind, value.clone(), format!($desc, value))
        }
    };
}

locator_ctor!(by_aria_label, LocatorType::AriaLabel, "aria-label*={}");
locator_ctor!(by_test_id, LocatorType::TestId, "data-testid={}");
locator_ctor!(by_automation_id, LocatorType::AutomationId, "data-automation-id={}");
locator_ctor!(by_placeholder, LocatorType::Placeholder, "placeholder*={}");
locator_ctor!(by_css, LocatorType::Css, "css={}");
locator_ctor!(by_xpath, LocatorType::Xpath, "xpath={}");
locator_ctor!(by_id, LocatorType::Id, "id={}");
locator_ctor!(by_name, LocatorType::Name, "name={}");

#[must_use]
pub fn by_role(role: &str, name: Option<&str>) -> Locator {
    match name {
        Some(name) => {
            let mut loc = Locator::new(LocatorType::AriaLabel, name, format!("role={role}, name={name}"));
            loc.description = format!("role={role}, name={name}");
            loc
        }
        None => Locator::new(LocatorType::Role, role, format!("role={role}")),
    }
}

#[must_use]
pub fn by_text(text: impl Into<String>, exact: bool) -> Locator {
    let text = text.into();
    let kind = if exact { LocatorType::TextExact } else { LocatorType::TextContains };
    let marker = if exact { "=" } else { "*=" };
    Locator::new(kind, text.clone(), format!("text{marker}{text}"))
}

/// Hint keys a caller can supply to [`build_locator`], in the same priority
/// order that function tries them. Not every key needs to be present — the
/// first one found wins.
pub const HINT_ROLE: &str = "role";
pub const HINT_ARIA_LABEL: &str = "aria-label";
pub const HINT_TEST_ID: &str = "data-testid";
pub const HINT_AUTOMATION_ID: &str = "data-automation-id";
pub const HINT_TEXT: &str = "text";
pub const HINT_TEXT_EXACT: &str = "exact";
pub const HINT_PLACEHOLDER: &str = "placeholder";
pub const HINT_ID: &str = "id";
pub const HINT_NAME: &str = "name";
pub const HINT_CSS: &str = "css";
pub const HINT_XPATH: &str = "xpath";

/// A loose bag of element hints (`role`, `aria-label`, `data-testid`, free
/// text, ...) a caller assembles without knowing which one will actually be
/// used — see [`build_locator`].
pub type HintsMap = std::collections::HashMap<String, String>;

/// Picks one locator out of whichever hints are present, trying them in the
/// same most-to-least-stable priority order [`LocatorType`] documents:
/// role/aria-label first, test/automation ids next, then text/placeholder,
/// then id/name/css, xpath last. Returns `None` if none of the recognized
/// keys are present rather than erroring, since an empty hints map is a
/// caller bug the type system can't rule out but also isn't this function's
/// to panic over.
#[must_use]
pub fn build_locator(hints: &HintsMap) -> Option<Locator> {
    if let Some(role) = hints.get(HINT_ROLE) {
        return Some(by_role(role, hints.get(HINT_ARIA_LABEL).map(String::as_str)));
    }
    if let Some(label) = hints.get(HINT_ARIA_LABEL) {
        return Some(by_aria_label(label.clone()));
    }
    if let Some(test_id) = hints.get(HINT_TEST_ID) {
        return Some(by_test_id(test_id.clone()));
    }
    if let Some(automation_id) = hints.get(HINT_AUTOMATION_ID) {
        return Some(by_automation_id(automation_id.clone()));
    }
    if let Some(text) = hints.get(HINT_TEXT) {
        let exact = hints.get(HINT_TEXT_EXACT).is_some_and(|v| v == "true");
        return Some(by_text(text.clone(), exact));
    }
    if let Some(placeholder) = hints.get(HINT_PLACEHOLDER) {
        return Some(by_placeholder(placeholder.clone()));
    }
    if let Some(id) = hints.get(HINT_ID) {
        return Some(by_id(id.clone()));
    }
    if let Some(name) = hints.get(HINT_NAME) {
        return Some(by_name(name.clone()));
    }
    if let Some(css) = hints.get(HINT_CSS) {
        return Some(by_css(css.clone()));
    }
    if let Some(xpath) = hints.get(HINT_XPATH) {
        return Some(by_xpath(xpath.clone()));
    }
    None
}
