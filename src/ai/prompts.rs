use std::collections::HashMap;
use std::path::Path;

use tokio::fs;

use crate::nlp::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Selection,
    Inquiry,
    Composition,
    Comparison,
    Complaint,
    General,
}

impl PromptKind {
    pub const ALL: [PromptKind; 6] = [
        PromptKind::Selection,
        PromptKind::Inquiry,
        PromptKind::Composition,
        PromptKind::Comparison,
        PromptKind::Complaint,
        PromptKind::General,
    ];

    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Inquiry => "inquiry",
            Self::Composition => "composition",
            Self::Comparison => "comparison",
            Self::Complaint => "complaint",
            Self::General => "general",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Self::Selection => include_str!("../../prompts/selection.md"),
            Self::Inquiry => include_str!("../../prompts/inquiry.md"),
            Self::Composition => include_str!("../../prompts/composition.md"),
            Self::Comparison => include_str!("../../prompts/comparison.md"),
            Self::Complaint => include_str!("../../prompts/complaint.md"),
            Self::General => include_str!("../../prompts/general.md"),
        }
    }

    pub fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::ProductSelection => Self::Selection,
            Intent::ProductInquiry | Intent::DosageInquiry | Intent::Contraindications => {
                Self::Inquiry
            }
            Intent::CompositionInquiry => Self::Composition,
            Intent::Complaint => Self::Complaint,
            _ => Self::General,
        }
    }

    /// Keyword routing for callers that have no classified intent.
    pub fn by_keywords(query: &str) -> Self {
        const RULES: &[(PromptKind, &[&str])] = &[
            (
                PromptKind::Comparison,
                &["отличие", "различие", "разница", "сравни", "или", "vs", "чем отличается", "что лучше"],
            ),
            (
                PromptKind::Composition,
                &["состав", "компонент", "ингредиент", "входит", "содержит", "из чего"],
            ),
            (
                PromptKind::Selection,
                &[
                    "нужно", "нужен", "нужна", "посоветуй", "порекомендуй",
                    "что принимать", "что пить", "помоги выбрать", "какой продукт",
                    "для иммунитета", "от простуды", "для печени",
                ],
            ),
            (
                PromptKind::Inquiry,
                &["расскажи о", "что такое", "информация о", "свойства", "для чего", "зачем", "как работает"],
            ),
            (
                PromptKind::Complaint,
                &["не помогает", "не работает", "плохо", "хуже", "побочный эффект", "аллергия", "не подошло"],
            ),
        ];

        let lower = query.to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(kind, _)| *kind)
            .unwrap_or(Self::General)
    }
}

/// System prompts keyed by request type. Built-in texts can be replaced by
/// `<kind>.md` files in a prompts directory.
#[derive(Debug, Clone)]
pub struct PromptManager {
    prompts: HashMap<PromptKind, String>,
}

impl Default for PromptManager {
    fn default() -> Self {
        Self {
            prompts: PromptKind::ALL
                .iter()
                .map(|k| (*k, k.builtin().to_string()))
                .collect(),
        }
    }
}

impl PromptManager {
    pub async fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut manager = Self::default();
        for kind in PromptKind::ALL {
            let path = dir.join(format!("{}.md", kind.file_stem()));
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                tracing::warn!("Prompt file {:?} is empty, keeping built-in text", path);
                continue;
            }
            tracing::info!("Loaded prompt override {:?}", path);
            manager.prompts.insert(kind, content);
        }
        Ok(manager)
    }

    pub fn get(&self, kind: PromptKind) -> &str {
        self.prompts
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.builtin())
    }

    pub fn for_intent(&self, intent: Intent) -> &str {
        self.get(PromptKind::for_intent(intent))
    }

    pub fn by_keywords(&self, query: &str) -> &str {
        self.get(PromptKind::by_keywords(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_routing_order() {
        assert_eq!(PromptKind::by_keywords("Что лучше: Солберри или Битерон?"), PromptKind::Comparison);
        assert_eq!(PromptKind::by_keywords("Состав Солберри-H"), PromptKind::Composition);
        assert_eq!(PromptKind::by_keywords("Посоветуй что-нибудь"), PromptKind::Selection);
        assert_eq!(PromptKind::by_keywords("Расскажи о Битероне"), PromptKind::Inquiry);
        assert_eq!(PromptKind::by_keywords("аллергия"), PromptKind::Complaint);
        assert_eq!(PromptKind::by_keywords("привет"), PromptKind::General);
    }

    #[test]
    fn intent_mapping_defaults_to_general() {
        assert_eq!(PromptKind::for_intent(Intent::DosageInquiry), PromptKind::Inquiry);
        assert_eq!(PromptKind::for_intent(Intent::Unknown), PromptKind::General);
    }

    #[tokio::test]
    async fn directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("general.md"), "CUSTOM").unwrap();
        std::fs::write(dir.path().join("complaint.md"), "  ").unwrap();

        let manager = PromptManager::load(dir.path()).await.unwrap();
        assert_eq!(manager.get(PromptKind::General), "CUSTOM");
        assert!(manager.get(PromptKind::Complaint).contains("сочувствие"));
    }
}
