//! Context-aware error suggestions.
//!
//! Complements the static suggestions in the `codes` module with text that
//! names the platform, tag or version involved.

use serde_json::Value;

use super::codes::ErrorCode;

/// Suggestion for `code`, specialized by `context` when it carries details.
#[must_use]
pub fn suggest_for_error(code: ErrorCode, context: Option<&Value>) -> String {
    match code {
        ErrorCode::NoMatchingAsset => suggest_no_matching_asset(context),
        ErrorCode::MalformedVersion => suggest_malformed_version(context),
        _ => code.suggestion().to_string(),
    }
}

fn field<'a>(context: Option<&'a Value>, key: &str) -> Option<&'a str> {
    context.and_then(|c| c.get(key)).and_then(Value::as_str)
}

fn suggest_no_matching_asset(context: Option<&Value>) -> String {
    match (field(context, "platform"), field(context, "tag")) {
        (Some(platform), Some(tag)) => format!(
            "Release {tag} has no installer for {platform}. Download it manually from the releases page, or wait for the next release"
        ),
        _ => ErrorCode::NoMatchingAsset.suggestion().to_string(),
    }
}

fn suggest_malformed_version(context: Option<&Value>) -> String {
    match field(context, "version") {
        Some(raw) => format!(
            "Unable to determine update status. {raw:?} is not a vMAJOR.MINOR.PATCH version; if it is the running version, set UCM_CURRENT_VERSION"
        ),
        None => ErrorCode::MalformedVersion.suggestion().to_string(),
    }
}
