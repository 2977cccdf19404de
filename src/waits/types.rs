//! Condition and result types for the Wait Engine.

use serde::{Deserialize, Serialize};

use crate::error::ReasonCode;

/// What a [`super::WaitEngine`] can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    ElementExists,
    ElementVisible,
    ElementClickable,
    ElementEnabled,
    ElementHidden,
    TextPresent,
    TextAbsent,
    AttributeEquals,
    AttributeContains,
    UrlContains,
    UrlMatches,
    TitleContains,
    DocumentReady,
    PageLoaded,
    NetworkIdle,
    NoPendingRequests,
    LayoutStable,
    JsExpression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitCondition {
    pub kind: ConditionType,
    pub selector: Option<String>,
    /// Only used by `ConditionType::JsExpression`: a boolean-returning
    /// expression evaluated on each poll.
    pub expression: Option<String>,
    /// `TextPresent`/`TextAbsent`: the substring to look for in the
    /// element's trimmed text content.
    pub text: Option<String>,
    /// `AttributeEquals`/`AttributeContains`: which attribute to read.
    pub attribute: Option<String>,
    /// `AttributeEquals`/`AttributeContains`/`UrlContains`/`TitleContains`:
    /// the value compared against.
    pub value: Option<String>,
    /// `UrlMatches`: a regular expression matched against `location.href`.
    pub pattern: Option<String>,
}

impl WaitCondition {
    fn bare(kind: ConditionType) -> Self {
        Self {
            kind,
            selector: None,
            expression: None,
            text: None,
            attribute: None,
            value: None,
            pattern: None,
        }
    }

    #[must_use]
    pub fn element_exists(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(ConditionType::ElementExists)
        }
    }

    #[must_use]
    pub fn element_visible(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(ConditionType::ElementVisible)
        }
    }

    #[must_use]
    pub fn element_clickable(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(ConditionType::ElementClickable)
        }
    }

    #[must_use]
    pub fn element_enabled(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(ConditionType::ElementEnabled)
        }
    }

    #[must_use]
    pub fn element_hidden(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(ConditionType::ElementHidden)
        }
    }

    #[must_use]
    pub fn text_present(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            text: Some(text.into()),
            ..Self::bare(ConditionType::TextPresent)
        }
    }

    #[must_use]
    pub fn text_absent(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            text: Some(text.into()),
            ..Self::bare(ConditionType::TextAbsent)
        }
    }

    #[must_use]
    pub fn attribute_equals(
        selector: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            selector: Some(selector.into()),
            attribute: Some(attribute.into()),
            value: Some(value.into()),
            ..Self::bare(ConditionType::AttributeEquals)
        }
    }

    #[must_use]
    pub fn attribute_contains(
        selector: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            selector: Some(selector.into()),
            attribute: Some(attribute.into()),
            value: Some(value.into()),
            ..Self::bare(ConditionType::AttributeContains)
        }
    }

    #[must_use]
    pub fn url_contains(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::bare(ConditionType::UrlContains)
        }
    }

    #[must_use]
    pub fn url_matches(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::bare(ConditionType::UrlMatches)
        }
    }

    #[must_use]
    pub fn title_contains(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::bare(ConditionType::TitleContains)
        }
    }

    #[must_use]
    pub fn document_ready() -> Self {
        Self::bare(ConditionType::DocumentReady)
    }

    #[must_use]
    pub fn page_loaded() -> Self {
        Self::bare(ConditionType::PageLoaded)
    }

    #[must_use]
    pub fn network_idle() -> Self {
        Self::bare(ConditionType::NetworkIdle)
    }

    #[must_use]
    pub fn no_pending_requests() -> Self {
        Self::bare(ConditionType::NoPendingRequests)
    }

    #[must_use]
    pub fn layout_stable(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::bare(ConditionType::LayoutStable)
        }
    }

    #[must_use]
    pub fn js_expression(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::bare(ConditionType::JsExpression)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitResult {
    pub success: bool,
    pub reason: ReasonCode,
    pub elapsed_ms: u64,
    pub message: Option<String>,
}

impl WaitResult {
    #[must_use]
    pub fn success(elapsed_ms: u64) -> Self {
        Self {
            success: true,
            reason: ReasonCode::ConditionMet,
            elapsed_ms,
            message: None,
        }
    }

    #[must_use]
    pub fn timeout(reason: ReasonCode, elapsed_ms: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            reason,
            elapsed_ms,
            message: Some(message.into()),
        }
    }
}
