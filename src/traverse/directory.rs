//! Breadth-first walk over a directory-listing site (`<pre><a>` index pages).

use std::collections::{HashSet, VecDeque};

use tracing::Instrument;
use url::Url;

use super::{cap_reached, CatalogNode, LeafCandidate, NodeKind, WalkStats};
use crate::error::ExpansionError;
use crate::session::{BrowserSession, Locator};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase, Scrape};

#[derive(Clone, Debug)]
pub struct DirectoryWalk {
    pub entry_url: String,
    pub entry_locator: Locator,
    pub leaf_extensions: Vec<&'static str>,
    pub skip_extensions: Vec<&'static str>,
    /// Entry labels never followed (parent reference, archive path).
    pub excluded: Vec<&'static str>,
    pub report_file: Option<&'static str>,
    pub cap: Option<usize>,
}

/// A firmware file found in a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryLeaf {
    pub url: String,
    pub name: String,
    /// Sibling text report of the directory that held the file.
    pub report_url: Option<String>,
}

impl DirectoryWalk {
    /// Pure classification of one listing entry by label and target.
    pub fn classify(&self, name: &str, href: &str) -> NodeKind {
        let name = name.trim();
        if name.is_empty() || self.excluded.iter().any(|e| *e == name) {
            return NodeKind::Skip;
        }
        match extension(href) {
            Some(ext) if self.leaf_extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) => NodeKind::LeafCandidate,
            Some(ext) if self.skip_extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) => NodeKind::Skip,
            _ => NodeKind::Container,
        }
    }

    pub async fn walk(
        &self,
        session: &mut dyn BrowserSession,
        log: &LogCtx<Scrape>,
    ) -> (Vec<LeafCandidate<DirectoryLeaf>>, WalkStats) {
        let mut stats = WalkStats::default();
        let mut leaves = Vec::new();

        let root = match Url::parse(&self.entry_url) {
            Ok(u) => normalize_dir(u),
            Err(e) => {
                log.error(format!("invalid entry url {}: {e}", self.entry_url));
                stats.expansion_failures += 1;
                return (leaves, stats);
            }
        };

        let mut queue = VecDeque::from([root.clone()]);
        let mut visited: HashSet<String> = HashSet::new();
        // files linked from more than one listing are emitted once
        let mut seen_files: HashSet<String> = HashSet::new();

        while let Some(dir) = queue.pop_front() {
            if cap_reached(self.cap, leaves.len()) {
                log.info(format!("result cap reached after {} files", leaves.len()));
                break;
            }
            if !visited.insert(dir.to_string()) {
                continue;
            }
            stats.categories += 1;

            let span = log.span_kv(&Phase::Expand, [("dir", dir.to_string())]);
            let nodes = match self.expand(session, &dir).instrument(span).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    stats.expansion_failures += 1;
                    log.warn(e.to_string());
                    continue;
                }
            };

            let report_url = self.report_file.and_then(|file| {
                nodes.iter().find(|n| n.label.trim() == file).map(|n| n.handle.to_string())
            });
            let path = relative_segments(&root, &dir);
            let mut found = 0usize;

            for node in nodes {
                match node.kind {
                    NodeKind::LeafCandidate => {
                        if cap_reached(self.cap, leaves.len()) { break; }
                        if !seen_files.insert(node.handle.to_string()) {
                            log.debug(format!("{} already listed", node.handle));
                            continue;
                        }
                        found += 1;
                        leaves.push(LeafCandidate {
                            path: path.clone(),
                            item: DirectoryLeaf {
                                url: node.handle.to_string(),
                                name: node.label.trim().to_string(),
                                report_url: report_url.clone(),
                            },
                        });
                    }
                    NodeKind::Container => {
                        let child = normalize_dir(node.handle);
                        if !child.as_str().starts_with(root.as_str()) {
                            log.debug(format!("not following {child}: outside {root}"));
                            continue;
                        }
                        if !visited.contains(child.as_str()) {
                            queue.push_back(child);
                        }
                    }
                    NodeKind::Skip => {}
                }
            }
            if found > 0 {
                log.debug_kv("directory leaves", [("dir", dir.to_string()), ("files", found.to_string())]);
            }
        }

        stats.leaves = leaves.len();
        (leaves, stats)
    }

    async fn expand(&self, session: &mut dyn BrowserSession, dir: &Url) -> Result<Vec<CatalogNode<Url>>, ExpansionError> {
        let container = dir.to_string();
        session.navigate(dir.as_str()).await.map_err(|e| ExpansionError::from_session(container.clone(), e))?;
        let links = session
            .find_all(None, &self.entry_locator)
            .await
            .map_err(|e| ExpansionError::from_session(container.clone(), e))?;

        let mut nodes = Vec::with_capacity(links.len());
        for link in &links {
            let label = session.read_text(link).await.map_err(|e| ExpansionError::from_session(container.clone(), e))?;
            let href = session
                .read_attribute(link, "href")
                .await
                .map_err(|e| ExpansionError::from_session(container.clone(), e))?;
            let Some(href) = href else { continue };
            let Ok(target) = dir.join(&href) else { continue };
            let kind = self.classify(&label, target.path());
            nodes.push(CatalogNode { handle: target, label, kind, parent: Some(container.clone()) });
        }
        Ok(nodes)
    }
}

/// Lowercased extension (with dot) of the last path segment, if any.
fn extension(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let last = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() { return None; }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

fn normalize_dir(mut url: Url) -> Url {
    url.set_fragment(None);
    url.set_query(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn relative_segments(root: &Url, dir: &Url) -> Vec<String> {
    dir.path()
        .strip_prefix(root.path())
        .unwrap_or(dir.path())
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::session::fixture::FixtureFetcher;
    use crate::session::static_html::StaticSession;
    use crate::telemetry;

    const ROOT: &str = "https://download.test/";

    fn listing(entries: &[&str]) -> String {
        let links: Vec<String> = entries.iter().map(|e| format!(r#"<a href="{e}">{e}</a>"#)).collect();
        format!("<html><body><h1>Index</h1><hr><pre>{}</pre></body></html>", links.join("\n"))
    }

    fn walker(cap: Option<usize>) -> DirectoryWalk {
        DirectoryWalk {
            entry_url: ROOT.into(),
            entry_locator: Locator::css("pre > a"),
            leaf_extensions: vec![".image", ".exe", ".zip", ".dmg"],
            skip_extensions: vec![".txt"],
            excluded: vec!["../", "archive/"],
            report_file: Some("info_en.txt"),
            cap,
        }
    }

    fn site() -> FixtureFetcher {
        FixtureFetcher::new()
            .page(ROOT, &listing(&["../", "archive/", "fooA/", "fooB/"]))
            .page("https://download.test/fooA/", &listing(&["../", "image1.image", "info_en.txt", "sub/"]))
            .page("https://download.test/fooA/sub/", &listing(&["../", "/fooA/", "image3.zip"]))
            .page("https://download.test/fooB/", &listing(&["../", "image2.exe", "https://elsewhere.test/x/"]))
            .page("https://download.test/archive/", &listing(&["old.image"]))
    }

    async fn run(fetcher: FixtureFetcher, cap: Option<usize>) -> (Vec<LeafCandidate<DirectoryLeaf>>, WalkStats) {
        let log = telemetry::scrape();
        let mut session = StaticSession::new(Arc::new(fetcher), Duration::from_secs(5));
        walker(cap).walk(&mut session, &log).await
    }

    #[test]
    fn classifies_entries() {
        let w = walker(None);
        assert_eq!(w.classify("../", "/"), NodeKind::Skip);
        assert_eq!(w.classify("archive/", "/archive/"), NodeKind::Skip);
        assert_eq!(w.classify("FRITZ.Box_7590.image", "/fritzbox/FRITZ.Box_7590.image"), NodeKind::LeafCandidate);
        assert_eq!(w.classify("setup.EXE", "/tools/setup.EXE"), NodeKind::LeafCandidate);
        assert_eq!(w.classify("info_en.txt", "/fritzbox/info_en.txt"), NodeKind::Skip);
        assert_eq!(w.classify("fritz.os/", "/fritzbox/fritz.os/"), NodeKind::Container);
        assert_eq!(w.classify("deutschland/", "/fritzbox/deutschland/"), NodeKind::Container);
    }

    #[tokio::test]
    async fn yields_each_leaf_once_with_its_report() {
        let (leaves, stats) = run(site(), None).await;
        let urls: Vec<&str> = leaves.iter().map(|l| l.item.url.as_str()).collect();
        assert_eq!(urls, vec![
            "https://download.test/fooA/image1.image",
            "https://download.test/fooB/image2.exe",
            "https://download.test/fooA/sub/image3.zip",
        ]);
        assert_eq!(leaves[0].item.report_url.as_deref(), Some("https://download.test/fooA/info_en.txt"));
        assert_eq!(leaves[1].item.report_url, None);
        assert_eq!(leaves[2].path, vec!["fooA".to_string(), "sub".to_string()]);
        assert_eq!(leaves[2].top_level(), Some("fooA"));
        // root, fooA, fooB, fooA/sub; the back link to /fooA/ and the foreign host are not followed
        assert_eq!(stats.categories, 4);
        assert_eq!(stats.leaves, 3);
        assert_eq!(stats.expansion_failures, 0);
    }

    #[tokio::test]
    async fn file_linked_from_two_directories_appears_once() {
        let fetcher = FixtureFetcher::new()
            .page(ROOT, &listing(&["a/", "b/"]))
            .page("https://download.test/a/", &listing(&["/shared/fw.image", "a.image"]))
            .page("https://download.test/b/", &listing(&["/shared/fw.image"]));
        let (leaves, stats) = run(fetcher, None).await;
        let urls: Vec<&str> = leaves.iter().map(|l| l.item.url.as_str()).collect();
        assert_eq!(urls, vec!["https://download.test/shared/fw.image", "https://download.test/a/a.image"]);
        assert_eq!(leaves[0].path, vec!["a".to_string()]);
        assert_eq!(stats.leaves, 2);
    }

    #[tokio::test]
    async fn failed_directory_contributes_nothing() {
        let fetcher = FixtureFetcher::new()
            .page(ROOT, &listing(&["broken/", "ok/"]))
            .page("https://download.test/ok/", &listing(&["fw.image"]));
        let (leaves, stats) = run(fetcher, None).await;
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].item.name, "fw.image");
        assert_eq!(stats.expansion_failures, 1);
    }

    #[tokio::test]
    async fn cap_stops_expansion() {
        let fetcher = site();
        let log = telemetry::scrape();
        let fetcher = Arc::new(fetcher);
        let mut session = StaticSession::new(fetcher.clone(), Duration::from_secs(5));
        let (leaves, _) = walker(Some(1)).walk(&mut session, &log).await;
        assert_eq!(leaves.len(), 1);
        assert!(!fetcher.calls().iter().any(|u| u.ends_with("/fooB/")));
    }

    #[tokio::test]
    async fn walking_twice_gives_the_same_leaves() {
        let (first, _) = run(site(), None).await;
        let (second, _) = run(site(), None).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unreachable_entry_is_one_failure() {
        let (leaves, stats) = run(FixtureFetcher::new(), None).await;
        assert!(leaves.is_empty());
        assert_eq!(stats.expansion_failures, 1);
    }
}
