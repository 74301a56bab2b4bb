//! Localized message catalog for UI-facing strings.
//!
//! Only the English bundle ships today; the keys are the contract, the
//! strings are display defaults.

use std::collections::HashMap;

/// Message keys the site-selector UI asks for alongside a filtered listing.
pub const SITE_SELECTOR_KEYS: &[&str] = &[
    "select-host",
    "select-host-nice-message",
    "Invalid-option-selected",
    "manage-hosts",
    "cancel",
    "Change-Host",
];

/// Look a message key up in the default bundle.
#[must_use]
pub fn message(key: &str) -> Option<&'static str> {
    match key {
        "select-host" => Some("Select Site"),
        "select-host-nice-message" => Some("Please select a site to continue"),
        "Invalid-option-selected" => Some("Invalid option selected"),
        "manage-hosts" => Some("Manage Sites"),
        "cancel" => Some("Cancel"),
        "Change-Host" => Some("Change Site"),
        "please-enter-a-valid-login" => Some("Please enter a valid login"),
        "reset-password-token-invalid" => Some("The password reset token is invalid"),
        "reset-password-token-expired" => Some("The password reset token has expired"),
        "reset-password-invalid-password" => Some("The new password does not meet the policy"),
        _ => None,
    }
}

/// Resolve a set of keys into a key/message map for a response body.
///
/// Unknown keys fall back to the key itself, so a missing translation is
/// visible instead of silently dropped.
#[must_use]
pub fn messages_map(keys: &[&str]) -> HashMap<String, String> {
    keys.iter()
        .map(|key| ((*key).to_string(), message(key).unwrap_or(key).to_string()))
        .collect()
}
