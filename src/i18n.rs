// 🌐 Message localization
// Keys follow the "module.area.message" scheme; placeholders are written
// `{name}` and substituted from (name, value) pairs.

use std::collections::HashMap;

pub trait Translator: Send + Sync {
    /// Resolve `key` and substitute `args`. Unknown keys resolve to the key itself.
    fn translate(&self, key: &str, args: &[(&str, &str)]) -> String;
}

/// In-memory message catalog for one language
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in English messages for the medical module
    pub fn english() -> Self {
        let mut catalog = Catalog::new();
        catalog.insert(
            "medical.mutation.failed_to_delete_item",
            "Failed to delete item {uuid}",
        );
        catalog.insert(
            "medical.mutation.failed_to_delete_service",
            "Failed to delete service {uuid}",
        );
        catalog.insert("medical.mutation.item_not_found", "Item {uuid} not found");
        catalog.insert(
            "medical.mutation.service_not_found",
            "Service {uuid} not found",
        );
        catalog
    }

    pub fn insert(&mut self, key: &str, template: &str) {
        self.messages.insert(key.to_string(), template.to_string());
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str, args: &[(&str, &str)]) -> String {
        let Some(template) = self.messages.get(key) else {
            return key.to_string();
        };

        args.iter().fold(template.clone(), |message, (name, value)| {
            message.replace(&format!("{{{}}}", name), value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_catalog_substitutes_uuid() {
        let catalog = Catalog::english();

        let message = catalog.translate("medical.mutation.failed_to_delete_item", &[("uuid", "u1")]);

        assert_eq!(message, "Failed to delete item u1");
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        let catalog = Catalog::english();

        assert_eq!(catalog.translate("medical.unknown", &[]), "medical.unknown");
    }

    #[test]
    fn test_custom_catalog() {
        let mut catalog = Catalog::new();
        catalog.insert("medical.mutation.failed_to_delete_service", "Échec: {uuid}");

        let message =
            catalog.translate("medical.mutation.failed_to_delete_service", &[("uuid", "s9")]);

        assert_eq!(message, "Échec: s9");
    }
}
