use serde_json::Value;
use shared::domain::MenuItem;

use crate::IntegrationError;

pub const UNEXPECTED_FORMAT: &str = "AI response was not in the expected format (object with menuItems key containing an array).";

/// Parses the vision model's JSON answer into menu items, keeping the model's order.
///
/// The answer must be an object whose `menuItems` key holds an array of
/// `{ title, description }` objects. A missing description reads as empty; a
/// missing or non-string title rejects the whole answer.
pub fn parse_menu_content(content: &str) -> Result<Vec<MenuItem>, IntegrationError> {
    let parsed: Value = serde_json::from_str(content.trim()).map_err(|e| {
        IntegrationError::BadResponse(format!("AI response was not valid JSON: {e}"))
    })?;

    let Some(Value::Array(raw_items)) = parsed.get("menuItems") else {
        return Err(IntegrationError::BadResponse(UNEXPECTED_FORMAT.into()));
    };

    raw_items
        .iter()
        .enumerate()
        .map(|(position, raw)| {
            serde_json::from_value::<MenuItem>(raw.clone()).map_err(|e| {
                IntegrationError::BadResponse(format!(
                    "menu item {position} is malformed: {e}"
                ))
            })
        })
        .collect()
}
