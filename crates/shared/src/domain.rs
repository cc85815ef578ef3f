use std::fmt;

use serde::{Deserialize, Serialize};

/// One dish read off a menu photo. Position in the extracted list is its only identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl MenuItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Query sent to the web image search: the dish title alone.
    pub fn search_query(&self) -> String {
        self.title.clone()
    }

    /// Prompt sent to image generation; the server wraps it in the photo template.
    pub fn generation_prompt(&self) -> String {
        format!("{}, {}", self.title, self.description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    Generate,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::Search, ActionKind::Generate];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Search => "search",
            ActionKind::Generate => "generate",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_defaults_to_empty() {
        let item: MenuItem = serde_json::from_str(r#"{"title":"Soup"}"#).expect("item");
        assert_eq!(item, MenuItem::new("Soup", ""));
    }

    #[test]
    fn prompts_follow_item_fields() {
        let item = MenuItem::new("Caesar Salad", "romaine, croutons");
        assert_eq!(item.search_query(), "Caesar Salad");
        assert_eq!(item.generation_prompt(), "Caesar Salad, romaine, croutons");
    }
}
