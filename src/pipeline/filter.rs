//! Keyword filter: keeps posts about the election.

/// Terms a post must contain (any one, case-insensitive substring) to be kept.
pub const ELECTION_KEYWORDS: &[&str] = &[
    "выборы",
    "госдума",
    "депутат",
    "парламент",
    "2026",
    "ЦИК",
    "избиратель",
    "избирательная кампания",
    "кандидат",
    "партия",
    "явка",
];

/// Case-insensitive substring matcher over a fixed keyword set.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Filter with [`ELECTION_KEYWORDS`].
    pub fn election() -> Self {
        Self::new(ELECTION_KEYWORDS)
    }

    /// Whether `post` contains any keyword. Not whole-word.
    pub fn matches(&self, post: &str) -> bool {
        let lowered = post.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Keep matching posts, preserving order.
    pub fn apply(&self, posts: Vec<String>) -> Vec<String> {
        posts.into_iter().filter(|p| self.matches(p)).collect()
    }
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::election()
    }
}
