//! Selector Strategy: priority-ordered element location — semantic
//! role/aria first, test ids next, text within scope, CSS/XPath last.

mod core;
mod types;

pub use core::SelectorEngine;
pub use types::{
    build_locator, by_aria_label, by_automation_id, by_css, by_id, by_name, by_placeholder,
    by_role, by_test_id, by_text, by_xpath, ElementHandle, FrameContext, HintsMap, Locator,
    LocatorType,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_locator_without_name_compiles_to_role_attribute() {
        let locator = by_role("button", None);
        assert_eq!(locator.to_css_selector().unwrap(), r#"[role="button"]"#);
    }

    #[test]
    fn role_locator_with_name_becomes_aria_label() {
        let locator = by_role("button", Some("Submit"));
        assert_eq!(locator.kind, LocatorType::AriaLabel);
        assert_eq!(locator.to_css_selector().unwrap(), r#"[aria-label*="Submit"]"#);
    }

    #[test]
    fn text_locators_have_no_css_equivalent() {
        let locator = by_text("Continue", true);
        assert!(locator.to_css_selector().is_none());
        assert!(locator.kind.is_text_based());
    }

    #[test]
    fn css_attribute_values_are_escaped() {
        let locator = by_test_id(r#"x"onload="alert(1)"#);
        let selector = locator.to_css_selector().unwrap();
        assert!(!selector.contains(r#"""onload"#));
    }

    #[test]
    fn scoped_within_nests_the_parent_locator() {
        let locator = by_text("Submit", true).scoped_within(by_css("form.checkout"));
        let scope = locator.scope.expect("scope set");
        assert_eq!(scope.kind, LocatorType::Css);
        assert_eq!(scope.value, "form.checkout");
    }

    #[test]
    fn within_frame_sets_the_frame_selector() {
        let locator = by_id("submit").within_frame("iframe#checkout");
        assert_eq!(locator.frame.as_deref(), Some("iframe#checkout"));
    }

    #[test]
    fn build_locator_prefers_role_over_every_other_hint() {
        let mut hints = HintsMap::new();
        hints.insert("role".into(), "button".into());
        hints.insert("data-testid".into(), "submit-btn".into());
        hints.insert("css".into(), ".submit".into());
        let locator = build_locator(&hints).expect("a locator");
        assert_eq!(locator.kind, LocatorType::Role);
        assert_eq!(locator.value, "button");
    }

    #[test]
    fn build_locator_combines_role_and_aria_label_into_one_locator() {
        let mut hints = HintsMap::new();
        hints.insert("role".into(), "button".into());
        hints.insert("aria-label".into(), "Submit".into());
        let locator = build_locator(&hints).expect("a locator");
        assert_eq!(locator.kind, LocatorType::AriaLabel);
        assert_eq!(locator.value, "Submit");
    }

    #[test]
    fn build_locator_falls_through_in_priority_order() {
        let mut hints = HintsMap::new();
        hints.insert("placeholder".into(), "Email".into());
        hints.insert("css".into(), ".email-input".into());
        let locator = build_locator(&hints).expect("a locator");
        assert_eq!(locator.kind, LocatorType::Placeholder);
    }

    #[test]
    fn build_locator_uses_text_exact_flag() {
        let mut hints = HintsMap::new();
        hints.insert("text".into(), "Continue".into());
        hints.insert("exact".into(), "true".into());
        let locator = build_locator(&hints).expect("a locator");
        assert_eq!(locator.kind, LocatorType::TextExact);
    }

    #[test]
    fn build_locator_returns_none_for_unrecognized_hints_only() {
        let mut hints = HintsMap::new();
        hints.insert("unrelated-key".into(), "value".into());
        assert!(build_locator(&hints).is_none());
    }
}
