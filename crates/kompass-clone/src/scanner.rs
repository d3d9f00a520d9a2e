//! Detection and rendering of template page links inside block text.
//!
//! A template link has the form `/admin/page/<page id>` with an optional
//! `#block-<block id>` anchor. Links are rewritten to
//! `/organization/<org id>/page/<page id>[#block-<block id>]`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use kompass_core::{defaults, Error, Result};

static TEMPLATE_LINK: Lazy<Regex> = Lazy::new(|| {
    build_pattern(defaults::TEMPLATE_LINK_PREFIX).expect("template link pattern is valid")
});

fn build_pattern(prefix: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"{}([0-9]+)(?:{}([0-9]+))?",
        regex::escape(prefix),
        regex::escape(defaults::BLOCK_ANCHOR_PREFIX)
    ))
}

/// One template link found in a text, addressed by byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkMatch {
    pub start: usize,
    pub end: usize,
    pub page_id: i64,
    pub block_id: Option<i64>,
}

/// Finds template links and renders their organization counterparts.
pub trait LinkScanner: Send + Sync {
    /// Non-overlapping links in `text`, in order of appearance.
    ///
    /// Matches whose ids cannot be represented are skipped.
    fn scan(&self, text: &str) -> Vec<LinkMatch>;

    /// Link to a copied page, optionally anchored on a copied block.
    fn render(&self, organization_id: i64, page_id: i64, block_id: Option<i64>) -> String {
        match block_id {
            Some(block_id) => format!(
                "/organization/{}/page/{}{}{}",
                organization_id,
                page_id,
                defaults::BLOCK_ANCHOR_PREFIX,
                block_id
            ),
            None => format!("/organization/{}/page/{}", organization_id, page_id),
        }
    }

    /// Rewrite every mapped link in `text`.
    ///
    /// Links to unmapped pages are kept byte-for-byte. An anchor on an
    /// unmapped block is dropped from an otherwise rewritten link. Returns
    /// `None` when nothing changed.
    fn rewrite(
        &self,
        text: &str,
        organization_id: i64,
        pages: &HashMap<i64, i64>,
        blocks: &HashMap<i64, i64>,
    ) -> Option<String> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut changed = false;

        for link in self.scan(text) {
            let Some(&new_page) = pages.get(&link.page_id) else {
                continue;
            };
            let new_block = link.block_id.and_then(|id| blocks.get(&id).copied());

            out.push_str(&text[cursor..link.start]);
            out.push_str(&self.render(organization_id, new_page, new_block));
            cursor = link.end;
            changed = true;
        }

        if !changed {
            return None;
        }
        out.push_str(&text[cursor..]);
        Some(out)
    }
}

/// Regex-backed scanner for `/admin/page/<id>(#block-<id>)?` links.
#[derive(Debug, Clone)]
pub struct PathLinkScanner {
    pattern: Regex,
}

impl Default for PathLinkScanner {
    fn default() -> Self {
        Self {
            pattern: TEMPLATE_LINK.clone(),
        }
    }
}

impl PathLinkScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner for template links under a different path prefix.
    pub fn with_prefix(prefix: &str) -> Result<Self> {
        if prefix.is_empty() {
            return Err(Error::Config("link prefix is empty".into()));
        }
        let pattern = build_pattern(prefix)
            .map_err(|e| Error::Config(format!("invalid link prefix {prefix:?}: {e}")))?;
        Ok(Self { pattern })
    }
}

impl LinkScanner for PathLinkScanner {
    fn scan(&self, text: &str) -> Vec<LinkMatch> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let page_id = caps.get(1)?.as_str().parse::<i64>().ok()?;
                let block_id = match caps.get(2) {
                    Some(m) => Some(m.as_str().parse::<i64>().ok()?),
                    None => None,
                };
                Some(LinkMatch {
                    start: whole.start(),
                    end: whole.end(),
                    page_id,
                    block_id,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps(pages: &[(i64, i64)], blocks: &[(i64, i64)]) -> (HashMap<i64, i64>, HashMap<i64, i64>) {
        (
            pages.iter().copied().collect(),
            blocks.iter().copied().collect(),
        )
    }

    #[test]
    fn test_scan_finds_page_and_anchor() {
        let scanner = PathLinkScanner::new();
        let text = r#"<a href="/admin/page/42#block-7">x</a> and /admin/page/3"#;
        let found = scanner.scan(text);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].page_id, 42);
        assert_eq!(found[0].block_id, Some(7));
        assert_eq!(&text[found[0].start..found[0].end], "/admin/page/42#block-7");
        assert_eq!(found[1].page_id, 3);
        assert_eq!(found[1].block_id, None);
    }

    #[test]
    fn test_rewrite_page_and_block() {
        let scanner = PathLinkScanner::new();
        let (pages, blocks) = maps(&[(42, 142)], &[(7, 107)]);

        let out = scanner.rewrite("/admin/page/42#block-7", 9, &pages, &blocks);
        assert_eq!(out.as_deref(), Some("/organization/9/page/142#block-107"));
    }

    #[test]
    fn test_unmapped_page_left_unchanged() {
        let scanner = PathLinkScanner::new();
        let (pages, blocks) = maps(&[(42, 142)], &[(7, 107)]);

        let text = "siehe /admin/page/5#block-7 dort";
        assert_eq!(scanner.rewrite(text, 9, &pages, &blocks), None);
    }

    #[test]
    fn test_unmapped_anchor_is_dropped() {
        let scanner = PathLinkScanner::new();
        let (pages, blocks) = maps(&[(42, 142)], &[]);

        let out = scanner.rewrite("/admin/page/42#block-8 ende", 9, &pages, &blocks);
        assert_eq!(out.as_deref(), Some("/organization/9/page/142 ende"));
    }

    #[test]
    fn test_prefix_ids_do_not_collide() {
        let scanner = PathLinkScanner::new();
        let (pages, blocks) = maps(&[(4, 104), (42, 142)], &[]);

        let out = scanner.rewrite("/admin/page/42 /admin/page/4", 1, &pages, &blocks);
        assert_eq!(
            out.as_deref(),
            Some("/organization/1/page/142 /organization/1/page/104")
        );
    }

    #[test]
    fn test_mixed_mapped_and_unmapped_links() {
        let scanner = PathLinkScanner::new();
        let (pages, blocks) = maps(&[(42, 142)], &[]);

        let out = scanner.rewrite("a /admin/page/1 b /admin/page/42 c", 2, &pages, &blocks);
        assert_eq!(out.as_deref(), Some("a /admin/page/1 b /organization/2/page/142 c"));
    }

    #[test]
    fn test_overflowing_id_is_ignored() {
        let scanner = PathLinkScanner::new();
        let text = "/admin/page/99999999999999999999999";
        assert!(scanner.scan(text).is_empty());
    }

    #[test]
    fn test_custom_prefix() {
        let scanner = PathLinkScanner::with_prefix("/vorlagen/seite/").unwrap();
        let found = scanner.scan("/vorlagen/seite/12 /admin/page/3");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].page_id, 12);

        assert!(PathLinkScanner::with_prefix("").is_err());
    }
}
