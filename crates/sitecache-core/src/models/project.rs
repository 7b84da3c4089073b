use serde::{Deserialize, Serialize};

/// A repository as returned by the GitHub REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub html_url: String,
    pub updated_at: Option<String>,
    pub created_at: Option<String>,
}

impl GithubRepo {
    pub fn to_project(&self, index: usize) -> Project {
        let language = self.language.clone().unwrap_or_else(|| "Other".to_string());
        Project {
            id: index as u64 + 1,
            name: self.name.clone(),
            description: self
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| format!("{} repository", self.name)),
            language: language.clone(),
            stars: self.stargazers_count,
            forks: self.forks_count,
            url: self.html_url.clone(),
            tags: vec![language, "GitHub".to_string()],
            is_from_github: true,
            updated_at: self.updated_at.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// A project card on the projects page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub language: String,
    pub stars: u64,
    pub forks: u64,
    pub url: String,
    pub tags: Vec<String>,
    #[serde(rename = "isFromGitHub")]
    pub is_from_github: bool,
    pub updated_at: Option<String>,
    pub created_at: Option<String>,
}
