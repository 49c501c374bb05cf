// src/common/i18n.rs

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

pub const DEFAULT_LOCALE: &str = "pt";

const EMBEDDED: &[(&str, &str)] = &[
    ("pt", include_str!("../../locales/pt.json")),
    ("en", include_str!("../../locales/en.json")),
];

// Catálogo de mensagens por idioma: "pt" -> { "errors.validation" -> "..." }
#[derive(Debug, Default)]
pub struct I18nStore {
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn from_catalogs(sources: &[(&str, &str)]) -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        for (lang, raw) in sources {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("Catálogo '{}' inválido: {}", lang, e))?;
            catalogs.insert(lang.to_string(), messages);
        }
        Ok(Self { catalogs })
    }

    /// Catálogos embutidos no binário, carregados uma única vez.
    pub fn shared() -> Arc<I18nStore> {
        static STORE: OnceLock<Arc<I18nStore>> = OnceLock::new();
        STORE
            .get_or_init(|| {
                let store = Self::from_catalogs(EMBEDDED).unwrap_or_else(|e| {
                    tracing::error!("🔥 Falha ao carregar traduções: {}", e);
                    Self::default()
                });
                Arc::new(store)
            })
            .clone()
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.catalogs.contains_key(lang)
    }

    // Idioma pedido -> idioma padrão -> a própria chave
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.catalogs
            .get(lang)
            .and_then(|c| c.get(key))
            .or_else(|| self.catalogs.get(DEFAULT_LOCALE).and_then(|c| c.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    pub fn translate_with(&self, lang: &str, key: &str, params: &[(&str, &str)]) -> String {
        let mut message = self.translate(lang, key);
        for (name, value) in params {
            message = message.replace(&format!("{{{}}}", name), value);
        }
        message
    }
}
