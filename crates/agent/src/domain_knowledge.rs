//! Domain knowledge store
//!
//! Known domains plus optional insight text per domain, kept as one JSON
//! document. Novel domains named by users are appended and the document is
//! written back. Registration is add-if-absent, so concurrent writers are
//! harmless.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::AgentError;

const DEFAULT_INSIGHT: &str =
    "I'll analyze your specific requirements to provide tailored recommendations.";

/// Comparison key for domain names
fn normalize(domain: &str) -> String {
    domain.trim().to_lowercase()
}

fn default_common_domains() -> Vec<String> {
    [
        "Education",
        "Healthcare",
        "Finance",
        "E-commerce",
        "Agriculture",
        "Logistics",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

/// Persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainKnowledge {
    #[serde(default = "default_common_domains")]
    pub common_domains: Vec<String>,
    #[serde(default)]
    pub custom_domains: Vec<String>,
    #[serde(default)]
    pub domain_insights: BTreeMap<String, String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for DomainKnowledge {
    fn default() -> Self {
        Self {
            common_domains: default_common_domains(),
            custom_domains: Vec::new(),
            domain_insights: BTreeMap::new(),
            last_updated: None,
        }
    }
}

impl DomainKnowledge {
    fn known(&self) -> impl Iterator<Item = &String> {
        self.common_domains.iter().chain(self.custom_domains.iter())
    }

    fn is_known(&self, domain: &str) -> bool {
        let needle = normalize(domain);
        self.known().any(|d| normalize(d) == needle)
    }
}

/// Result of registering a user-supplied domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRegistration {
    pub domain: String,
    pub is_new: bool,
    pub similar: Vec<String>,
    pub insight: String,
}

pub struct DomainKnowledgeStore {
    path: Option<PathBuf>,
    document: RwLock<DomainKnowledge>,
}

impl DomainKnowledgeStore {
    /// Load from `path`; a missing file starts from the default document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let document = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| AgentError::DomainStore(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&content)
                .map_err(|e| AgentError::DomainStore(format!("{}: {}", path.display(), e)))?
        } else {
            tracing::info!(path = %path.display(), "Domain knowledge file not found, using defaults");
            DomainKnowledge::default()
        };

        tracing::info!(
            path = %path.display(),
            common = document.common_domains.len(),
            custom = document.custom_domains.len(),
            "Loaded domain knowledge"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            document: RwLock::new(document),
        })
    }

    /// Store that never touches disk
    pub fn in_memory(document: DomainKnowledge) -> Self {
        Self {
            path: None,
            document: RwLock::new(document),
        }
    }

    pub fn common_domains(&self) -> Vec<String> {
        self.document.read().common_domains.clone()
    }

    pub fn snapshot(&self) -> DomainKnowledge {
        self.document.read().clone()
    }

    pub fn is_known(&self, domain: &str) -> bool {
        self.document.read().is_known(domain.trim())
    }

    /// Add `domain` if no known domain matches it case-insensitively.
    ///
    /// Returns true when the domain was new.
    pub fn add_domain(&self, domain: &str) -> bool {
        let domain = domain.trim();
        if domain.is_empty() {
            return false;
        }

        let mut document = self.document.write();
        if document.is_known(domain) {
            return false;
        }
        document.custom_domains.push(domain.to_string());
        document.last_updated = Some(Utc::now());
        tracing::info!(domain = %domain, "Registered new domain");

        // The file is replaced while the lock is held, so writers never interleave
        if let Some(path) = &self.path {
            if let Err(e) = write_document(path, &document) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write domain knowledge");
            }
        }
        true
    }

    /// Known domains whose name contains `domain` or is contained by it
    pub fn similar_domains(&self, domain: &str) -> Vec<String> {
        let needle = normalize(domain);
        if needle.is_empty() {
            return Vec::new();
        }
        self.document
            .read()
            .known()
            .filter(|known| {
                let candidate = normalize(known);
                candidate != needle && (candidate.contains(&needle) || needle.contains(&candidate))
            })
            .cloned()
            .collect()
    }

    pub fn insight(&self, domain: &str) -> String {
        let needle = normalize(domain);
        self.document
            .read()
            .domain_insights
            .iter()
            .find(|(name, _)| normalize(name) == needle)
            .map(|(_, insight)| insight.clone())
            .unwrap_or_else(|| DEFAULT_INSIGHT.to_string())
    }

    /// Register a domain and gather what the reply needs about it
    pub fn register(&self, domain: &str) -> DomainRegistration {
        let domain = domain.trim().to_string();
        let is_new = self.add_domain(&domain);
        DomainRegistration {
            similar: if is_new {
                self.similar_domains(&domain)
            } else {
                Vec::new()
            },
            insight: self.insight(&domain),
            is_new,
            domain,
        }
    }
}

/// Write `document` to a sibling temp file and rename it over `path`.
fn write_document(path: &Path, document: &DomainKnowledge) -> Result<(), AgentError> {
    let store_error =
        |e: std::io::Error| AgentError::DomainStore(format!("{}: {}", path.display(), e));

    let json = serde_json::to_vec_pretty(document)
        .map_err(|e| AgentError::DomainStore(e.to_string()))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(dir).map_err(store_error)?;
    file.write_all(&json).map_err(store_error)?;
    file.persist(path).map_err(|e| store_error(e.error))?;
    Ok(())
}

impl Default for DomainKnowledgeStore {
    fn default() -> Self {
        Self::in_memory(DomainKnowledge::default())
    }
}
