//! Token index: positional text fragments produced by the extractor,
//! grouped per page. Immutable once loaded.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ErrorContext, LedgerResult};

/// Page size used when the extractor does not report one (A4 in points)
pub const DEFAULT_PAGE_WIDTH: f32 = 595.0;
pub const DEFAULT_PAGE_HEIGHT: f32 = 842.0;

/// Tokens claiming a page at or past this index are dropped as malformed
pub const MAX_PAGES: usize = 10_000;

/// Bounding box in document coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// A text fragment located on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "page_or_zero")]
    pub page: usize,
    #[serde(flatten)]
    pub bbox: BBox,
}

/// Declared size of a page in document coordinate space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_PAGE_WIDTH,
            height: DEFAULT_PAGE_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub tokens: Vec<Token>,
    pub size: PageSize,
}

/// Per-page token collections plus an id lookup
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    pages: Vec<Page>,
    by_id: HashMap<String, (usize, usize)>,
}

impl TokenIndex {
    /// Group tokens by their page index, keeping extraction order within a page.
    /// Tokens with an out-of-range page are logged and skipped.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| {
                let in_range = t.page < MAX_PAGES;
                if !in_range {
                    warn!("Token {} on page {} skipped: page out of range", t.id, t.page);
                }
                in_range
            })
            .collect();

        let page_count = tokens
            .iter()
            .filter_map(|t| t.page.checked_add(1))
            .max()
            .unwrap_or(0);
        let mut pages: Vec<Page> = (0..page_count).map(|_| Page::default()).collect();
        let mut by_id = HashMap::with_capacity(tokens.len());

        for token in tokens {
            let Some(page) = pages.get_mut(token.page) else {
                continue;
            };
            if by_id.contains_key(&token.id) {
                warn!("Duplicate token id {} ignored", token.id);
                continue;
            }
            by_id.insert(token.id.clone(), (token.page, page.tokens.len()));
            page.tokens.push(token);
        }

        Self { pages, by_id }
    }

    /// Parse the extractor's token file content (a JSON array of token records)
    pub fn from_json(content: &str) -> LedgerResult<Self> {
        let tokens: Vec<Token> = serde_json::from_str(content)?;
        Ok(Self::from_tokens(tokens))
    }

    pub fn load_from_file(path: &Path) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let index = Self::from_json(&content)?;
        info!(
            "📄 Loaded {} tokens over {} pages from {}",
            index.len(),
            index.page_count(),
            path.display()
        );
        Ok(index)
    }

    /// Ensure at least `count` pages exist (pages with images but no tokens)
    pub fn ensure_pages(&mut self, count: usize) {
        while self.pages.len() < count {
            self.pages.push(Page::default());
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Tokens on a page, empty when the page is unknown
    pub fn tokens_on(&self, index: usize) -> &[Token] {
        self.pages.get(index).map(|p| p.tokens.as_slice()).unwrap_or(&[])
    }

    pub fn page_size(&self, index: usize) -> PageSize {
        self.pages.get(index).map(|p| p.size).unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<&Token> {
        self.by_id
            .get(id)
            .and_then(|&(page, slot)| self.pages.get(page).and_then(|p| p.tokens.get(slot)))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid token id: {}", other))),
    }
}

fn page_or_zero<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<usize>::deserialize(deserializer)?.unwrap_or(0))
}
