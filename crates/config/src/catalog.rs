//! Pillar catalog
//!
//! An ordered list of pillars, each with an ordered list of questions. The
//! interview walks pillars and questions strictly in declared order, so the
//! catalog keeps insertion order instead of using a map.
//!
//! Two on-disk formats are accepted, picked by file extension:
//!
//! ```yaml
//! pillars:
//!   - pillar: Security
//!     questions:
//!       - What are your authentication requirements?
//! ```
//!
//! or a CSV with `Pillar` and `Key Question` columns, one question per row.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::ConfigError;

/// One pillar and its questions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarDefinition {
    pub pillar: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    pillars: Vec<PillarDefinition>,
}

/// Read-only pillar catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PillarCatalog {
    pillars: Vec<PillarDefinition>,
}

impl PillarCatalog {
    /// Build a catalog, rejecting duplicate pillars and empty question lists.
    pub fn new(pillars: Vec<PillarDefinition>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut cleaned = Vec::with_capacity(pillars.len());

        for def in pillars {
            let name = def.pillar.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "pillars.pillar".to_string(),
                    message: "Pillar name cannot be empty".to_string(),
                });
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::InvalidValue {
                    field: "pillars.pillar".to_string(),
                    message: format!("Duplicate pillar '{}'", name),
                });
            }

            let questions: Vec<String> = def
                .questions
                .iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect();
            if questions.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("pillars.{}.questions", name),
                    message: "Pillar must have at least one question".to_string(),
                });
            }

            cleaned.push(PillarDefinition {
                pillar: name,
                questions,
            });
        }

        Ok(Self { pillars: cleaned })
    }

    /// Load from a YAML or CSV file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let catalog = match extension.as_deref() {
            Some("csv") => Self::from_csv_path(path)?,
            Some("yaml") | Some("yml") => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
                Self::from_yaml_str(&content)?
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "agent.pillar_catalog_path".to_string(),
                    message: format!("Unsupported catalog format: {:?}", other),
                })
            }
        };

        tracing::info!(
            path = %path.display(),
            pillars = catalog.len(),
            questions = catalog.question_count(),
            "Loaded pillar catalog"
        );
        Ok(catalog)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::new(file.pillars)
    }

    fn from_csv_path(path: &Path) -> Result<Self, ConfigError> {
        let reader = csv::Reader::from_path(path)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        Self::from_csv_reader(reader)
    }

    pub fn from_csv_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_csv_reader(csv::Reader::from_reader(content.as_bytes()))
    }

    fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, ConfigError> {
        let headers = reader
            .headers()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| ConfigError::MissingField(format!("CSV column '{}'", name)))
        };
        let pillar_idx = column("Pillar")?;
        let question_idx = column("Key Question")?;

        let mut order: Vec<String> = Vec::new();
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for record in reader.records() {
            let record = record.map_err(|e| ConfigError::ParseError(e.to_string()))?;
            let pillar = record.get(pillar_idx).map(str::trim).unwrap_or_default();
            let question = record.get(question_idx).map(str::trim).unwrap_or_default();
            if pillar.is_empty() || question.is_empty() {
                continue;
            }
            if !grouped.contains_key(pillar) {
                order.push(pillar.to_string());
            }
            grouped
                .entry(pillar.to_string())
                .or_default()
                .push(question.to_string());
        }

        let pillars = order
            .into_iter()
            .map(|pillar| {
                let questions = grouped.remove(&pillar).unwrap_or_default();
                PillarDefinition { pillar, questions }
            })
            .collect();
        Self::new(pillars)
    }

    /// Pillar names in declared order
    pub fn pillars(&self) -> impl Iterator<Item = &str> {
        self.pillars.iter().map(|p| p.pillar.as_str())
    }

    pub fn definitions(&self) -> &[PillarDefinition] {
        &self.pillars
    }

    pub fn questions(&self, pillar: &str) -> Option<&[String]> {
        self.pillars
            .iter()
            .find(|p| p.pillar == pillar)
            .map(|p| p.questions.as_slice())
    }

    pub fn contains(&self, pillar: &str) -> bool {
        self.questions(pillar).is_some()
    }

    /// First question of `pillar` for which `is_answered` is false
    pub fn first_unanswered<F>(&self, pillar: &str, is_answered: F) -> Option<&str>
    where
        F: Fn(&str) -> bool,
    {
        self.questions(pillar)?
            .iter()
            .map(String::as_str)
            .find(|q| !is_answered(*q))
    }

    /// First pillar, in catalog order, not in `completed`
    pub fn next_incomplete(&self, completed: &[String]) -> Option<&str> {
        self.pillars()
            .find(|pillar| !completed.iter().any(|c| c == pillar))
    }

    pub fn len(&self) -> usize {
        self.pillars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pillars.is_empty()
    }

    pub fn question_count(&self) -> usize {
        self.pillars.iter().map(|p| p.questions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
pillars:
  - pillar: Scalability
    questions:
      - How many users do you expect at launch?
      - What growth do you expect in a year?
  - pillar: Security
    questions:
      - What are your authentication requirements?
"#;

    #[test]
    fn test_yaml_preserves_order() {
        let catalog = PillarCatalog::from_yaml_str(YAML).unwrap();
        let names: Vec<&str> = catalog.pillars().collect();
        assert_eq!(names, vec!["Scalability", "Security"]);
        assert_eq!(catalog.questions("Scalability").map(|q| q.len()), Some(2));
        assert_eq!(catalog.question_count(), 3);
    }

    #[test]
    fn test_csv_groups_by_first_appearance() {
        let csv = "Pillar,Key Question\n\
                   Security , Do you store PII? \n\
                   Performance,What latency is acceptable?\n\
                   Security,Any compliance regimes?\n\
                   ,orphan question\n\
                   Performance,\n";
        let catalog = PillarCatalog::from_csv_str(csv).unwrap();
        let names: Vec<&str> = catalog.pillars().collect();
        assert_eq!(names, vec!["Security", "Performance"]);
        assert_eq!(
            catalog.questions("Security").unwrap(),
            &["Do you store PII?".to_string(), "Any compliance regimes?".to_string()]
        );
        assert_eq!(catalog.questions("Performance").map(|q| q.len()), Some(1));
    }

    #[test]
    fn test_csv_missing_column() {
        let err = PillarCatalog::from_csv_str("Pillar,Question\nA,B\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_duplicate_pillar_rejected() {
        let defs = vec![
            PillarDefinition {
                pillar: "Security".to_string(),
                questions: vec!["Q1".to_string()],
            },
            PillarDefinition {
                pillar: "security".to_string(),
                questions: vec!["Q2".to_string()],
            },
        ];
        assert!(PillarCatalog::new(defs).is_err());
    }

    #[test]
    fn test_empty_questions_rejected() {
        let defs = vec![PillarDefinition {
            pillar: "Security".to_string(),
            questions: vec!["  ".to_string()],
        }];
        assert!(PillarCatalog::new(defs).is_err());
    }

    #[test]
    fn test_navigation_helpers() {
        let catalog = PillarCatalog::from_yaml_str(YAML).unwrap();

        let completed = vec!["Scalability".to_string()];
        assert_eq!(catalog.next_incomplete(&completed), Some("Security"));
        assert_eq!(catalog.next_incomplete(&[]), Some("Scalability"));

        let first = catalog.first_unanswered("Scalability", |q| q.starts_with("How many"));
        assert_eq!(first, Some("What growth do you expect in a year?"));
        assert_eq!(catalog.first_unanswered("Security", |_| true), None);
        assert_eq!(catalog.first_unanswered("Unknown", |_| false), None);
    }

    #[test]
    fn test_load_by_extension() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        yaml.write_all(YAML.as_bytes()).unwrap();
        assert_eq!(PillarCatalog::load(yaml.path()).unwrap().len(), 2);

        let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        csv.write_all(b"Pillar,Key Question\nSecurity,Q1\n").unwrap();
        assert_eq!(PillarCatalog::load(csv.path()).unwrap().len(), 1);

        let txt = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(PillarCatalog::load(txt.path()).is_err());

        assert!(matches!(
            PillarCatalog::load("/nonexistent/pillars.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
