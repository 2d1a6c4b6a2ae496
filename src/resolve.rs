//! Entity id resolution and benchmark candidate import.
//!
//! [`EntityIdResolver`] maps a `(title, page_id)` pair to an entity id by
//! trying, in this order:
//!
//! 1. the title as a current page title
//! 2. the title as a redirect, via its page id
//! 3. the given page id
//!
//! The first strategy that succeeds wins, and [`Resolution`] says which one
//! it was. A title hit therefore beats a disagreeing page id.
//!
//! [`import_ganea_candidates`] reads tab-separated candidate lists in the
//! Ganea & Hofmann format and resolves every candidate through the
//! resolver.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::Candidate;
use crate::normalize::normalize;

const WIKI_URL_PREFIX: &str = "http://en.wikipedia.org/wiki/";

/// Which lookup produced an entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Current page title.
    Title,
    /// Redirect title, through its page id.
    Redirect,
    /// Page id given with the query.
    PageId,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionStrategy::Title => "title",
            ResolutionStrategy::Redirect => "redirect",
            ResolutionStrategy::PageId => "page_id",
        };
        f.write_str(s)
    }
}

/// A resolved entity id and the strategy that found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Entity id.
    pub entity_id: &'a str,
    /// Winning strategy.
    pub strategy: ResolutionStrategy,
}

/// One row of a title/id mapping file.
#[derive(Debug, Deserialize)]
struct TitleIdRow {
    qid: String,
    #[serde(default)]
    title: Option<String>,
    wikipedia_title: String,
    id: serde_json::Value,
}

fn id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Title, redirect and page-id lookups for entity ids.
#[derive(Debug, Clone, Default)]
pub struct EntityIdResolver {
    title_to_entity: HashMap<String, String>,
    redirect_to_page: HashMap<String, String>,
    page_to_entity: HashMap<String, String>,
}

impl EntityIdResolver {
    /// Empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a current page title.
    #[must_use]
    pub fn with_title(mut self, title: &str, entity_id: &str) -> Self {
        self.title_to_entity
            .insert(title.to_string(), entity_id.to_string());
        self
    }

    /// Map a redirect title to the page it points at.
    #[must_use]
    pub fn with_redirect(mut self, title: &str, page_id: &str) -> Self {
        self.redirect_to_page
            .insert(title.to_string(), page_id.to_string());
        self
    }

    /// Map a page id.
    #[must_use]
    pub fn with_page(mut self, page_id: &str, entity_id: &str) -> Self {
        self.page_to_entity
            .insert(page_id.to_string(), entity_id.to_string());
        self
    }

    /// Resolve `(title, page_id)`; `None` when every strategy misses.
    pub fn resolve(&self, title: &str, page_id: Option<&str>) -> Option<Resolution<'_>> {
        if let Some(id) = self.title_to_entity.get(title) {
            return Some(Resolution {
                entity_id: id,
                strategy: ResolutionStrategy::Title,
            });
        }
        if let Some(id) = self
            .redirect_to_page
            .get(title)
            .and_then(|page| self.page_to_entity.get(page))
        {
            return Some(Resolution {
                entity_id: id,
                strategy: ResolutionStrategy::Redirect,
            });
        }
        page_id
            .and_then(|p| self.page_to_entity.get(p))
            .map(|id| Resolution {
                entity_id: id,
                strategy: ResolutionStrategy::PageId,
            })
    }

    /// Load a line-delimited title/id mapping.
    ///
    /// Each line carries `qid`, `wikipedia_title`, `id` (page id) and
    /// optionally `title` (the URL title, often a redirect). Wikipedia titles
    /// take precedence; a URL title is added only when no page already
    /// claims it. Rows with entity id `-1` are skipped.
    pub fn load_title_map(mut self, path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut url_titles: Vec<(String, String)> = Vec::new();
        let mut rows = 0usize;

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row: TitleIdRow = serde_json::from_str(&line).map_err(|e| {
                Error::malformed(format!("{}:{}: {}", path.display(), n + 1, e))
            })?;
            if row.qid == "-1" {
                continue;
            }
            rows += 1;
            if let Some(prev) = self.title_to_entity.get(&row.wikipedia_title) {
                if *prev != row.qid {
                    log::debug!(
                        "title {:?} maps to {} and {}; keeping {}",
                        row.wikipedia_title,
                        prev,
                        row.qid,
                        row.qid
                    );
                }
            }
            self.title_to_entity
                .insert(row.wikipedia_title.clone(), row.qid.clone());
            self.page_to_entity.insert(id_string(&row.id), row.qid.clone());
            if let Some(title) = row.title {
                url_titles.push((title, row.qid));
            }
        }
        for (title, qid) in url_titles {
            self.title_to_entity.entry(title).or_insert(qid);
        }

        log::info!(
            "Loaded {} title rows ({} titles, {} pages) from {}",
            rows,
            self.title_to_entity.len(),
            self.page_to_entity.len(),
            path.display()
        );
        Ok(self)
    }

    /// Load a tab-separated `old_title<TAB>page_id` redirect map.
    ///
    /// Titles given as Wikipedia URLs are reduced to plain titles.
    pub fn load_redirects(mut self, path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut count = 0usize;
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            let (title, page) = line.split_once('\t').ok_or_else(|| {
                Error::malformed(format!("{}:{}: expected title<TAB>page_id", path.display(), n + 1))
            })?;
            self.redirect_to_page
                .insert(title_from_url(title), page.trim().to_string());
            count += 1;
        }
        log::info!("Loaded {} redirects from {}", count, path.display());
        Ok(self)
    }
}

/// Plain title of a Wikipedia URL (or the input unchanged).
#[must_use]
pub fn title_from_url(url: &str) -> String {
    url.strip_prefix(WIKI_URL_PREFIX)
        .unwrap_or(url)
        .replace('_', " ")
}

/// One candidate of a benchmark candidate line, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    /// Wikipedia page id.
    pub page_id: String,
    /// Prior score.
    pub score: f64,
    /// Page title (may contain commas).
    pub title: String,
}

/// A parsed benchmark candidate line.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLine {
    /// Normalized mention alias.
    pub alias: String,
    /// Candidates in file order.
    pub candidates: Vec<RawCandidate>,
}

/// Parse one Ganea & Hofmann candidate line.
///
/// Layout: `doc  doc  mention  left  right  CANDIDATES  id,score,title ...  GT:  gold`.
/// Malformed candidate fields (such as `EMPTYCAND`) are skipped.
///
/// # Errors
///
/// [`Error::MalformedRecord`] if the `CANDIDATES` / `GT:` markers are not
/// where the layout puts them.
pub fn parse_ganea_line(line: &str) -> Result<CandidateLine> {
    let items: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if items.len() < 8 || items[5] != "CANDIDATES" || items[items.len() - 2] != "GT:" {
        return Err(Error::malformed(format!(
            "not a candidate line: {:?}",
            line.chars().take(80).collect::<String>()
        )));
    }
    let candidates = items[6..items.len() - 2]
        .iter()
        .filter_map(|field| {
            let mut parts = field.splitn(3, ',');
            let page_id = parts.next()?.trim();
            let score = parts.next()?.trim().parse::<f64>().ok()?;
            let title = parts.next()?;
            Some(RawCandidate {
                page_id: page_id.to_string(),
                score,
                title: title.to_string(),
            })
        })
        .collect();
    Ok(CandidateLine {
        alias: normalize(items[2]),
        candidates,
    })
}

/// Result of a benchmark candidate import.
#[derive(Debug, Clone, Default)]
pub struct CandidateImport {
    /// `alias → candidates`, best first, at most top-K each.
    pub candidates: BTreeMap<String, Vec<Candidate>>,
    /// Page ids no strategy could resolve.
    pub unresolved_pages: BTreeSet<String>,
    /// How many candidates each strategy resolved.
    pub resolved_by: BTreeMap<ResolutionStrategy, u64>,
    /// Candidate lines read.
    pub lines: usize,
}

impl CandidateImport {
    /// Write the `alias → [[entity_id, score], ...]` map.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(&self.candidates)?)?;
        Ok(())
    }
}

/// Import candidate lists from Ganea & Hofmann files.
///
/// Candidates are resolved through `resolver`; unresolved ones are
/// dropped and their page ids recorded. A candidate resolving to an
/// entity already listed for the alias is dropped as a duplicate. Lists
/// are stably sorted by descending score and truncated to `top_k`. When
/// an alias appears on several lines, the last line wins.
pub fn import_ganea_candidates(
    files: &[PathBuf],
    resolver: &EntityIdResolver,
    top_k: usize,
) -> Result<CandidateImport> {
    if top_k == 0 {
        return Err(Error::invalid_input("top_k must be at least 1"));
    }
    let mut import = CandidateImport::default();

    for file in files {
        let reader = BufReader::new(File::open(file)?);
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = parse_ganea_line(&line)
                .map_err(|e| Error::malformed(format!("{}:{}: {}", file.display(), n + 1, e)))?;
            import.lines += 1;

            let mut resolved: Vec<Candidate> = Vec::with_capacity(parsed.candidates.len());
            for raw in &parsed.candidates {
                match resolver.resolve(&raw.title, Some(&raw.page_id)) {
                    Some(hit) => {
                        *import.resolved_by.entry(hit.strategy).or_insert(0) += 1;
                        if !resolved.iter().any(|c| c.entity_id == hit.entity_id) {
                            resolved.push(Candidate::new(hit.entity_id, raw.score));
                        }
                    }
                    None => {
                        import.unresolved_pages.insert(raw.page_id.clone());
                    }
                }
            }
            resolved.sort_by(|a, b| b.score.total_cmp(&a.score));
            resolved.truncate(top_k);
            import.candidates.insert(parsed.alias, resolved);
        }
    }

    log::info!(
        "Loaded candidates for {} aliases from {} lines ({} unresolved page ids)",
        import.candidates.len(),
        import.lines,
        import.unresolved_pages.len()
    );
    Ok(import)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> EntityIdResolver {
        EntityIdResolver::new()
            .with_title("Paris", "Q90")
            .with_redirect("Paris, France", "22989")
            .with_page("22989", "Q90")
            .with_page("999", "Q999")
    }

    #[test]
    fn title_beats_page_id() {
        let res = resolver();
        let r = res.resolve("Paris", Some("999")).unwrap();
        assert_eq!(r.entity_id, "Q90");
        assert_eq!(r.strategy, ResolutionStrategy::Title);
    }

    #[test]
    fn redirect_resolves_through_page_of_redirect() {
        let res = resolver();
        let r = res.resolve("Paris, France", Some("999")).unwrap();
        assert_eq!(r.entity_id, "Q90");
        assert_eq!(r.strategy, ResolutionStrategy::Redirect);
    }

    #[test]
    fn page_id_is_last_resort() {
        let res = resolver();
        let r = res.resolve("Unknown", Some("999")).unwrap();
        assert_eq!(r.entity_id, "Q999");
        assert_eq!(r.strategy, ResolutionStrategy::PageId);
        assert!(resolver().resolve("Unknown", None).is_none());
        assert!(resolver().resolve("Unknown", Some("1")).is_none());
    }

    #[test]
    fn dangling_redirect_falls_through() {
        let res = EntityIdResolver::new()
            .with_redirect("Old", "404")
            .with_page("7", "Q7");
        let r = res.resolve("Old", Some("7")).unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::PageId);
    }

    #[test]
    fn loads_title_map_with_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titles.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"qid": "Q90", "title": "Paris (city)", "wikipedia_title": "Paris", "id": 22989}"#,
                "\n",
                r#"{"qid": "Q1", "title": "Paris", "wikipedia_title": "Paris (myth)", "id": "5"}"#,
                "\n",
                r#"{"qid": "-1", "title": "Junk", "wikipedia_title": "Junk", "id": 1}"#,
                "\n"
            ),
        )
        .unwrap();
        let r = EntityIdResolver::new().load_title_map(&path).unwrap();
        assert_eq!(r.resolve("Paris", None).unwrap().entity_id, "Q90");
        assert_eq!(r.resolve("Paris (city)", None).unwrap().entity_id, "Q90");
        assert_eq!(r.resolve("x", Some("22989")).unwrap().entity_id, "Q90");
        assert_eq!(r.resolve("x", Some("5")).unwrap().entity_id, "Q1");
        assert!(r.resolve("Junk", None).is_none());
    }

    #[test]
    fn loads_redirect_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redirects.txt");
        fs::write(&path, "http://en.wikipedia.org/wiki/Mike_Conley,_Sr.\t42\n").unwrap();
        let r = EntityIdResolver::new()
            .with_page("42", "Q42")
            .load_redirects(&path)
            .unwrap();
        let hit = r.resolve("Mike Conley, Sr.", None).unwrap();
        assert_eq!(hit.entity_id, "Q42");
        assert_eq!(hit.strategy, ResolutionStrategy::Redirect);
    }

    #[test]
    fn parses_candidate_line() {
        let line = "doc\tdoc\tParis\tleft\tright\tCANDIDATES\t22989,0.9,Paris\t7,0.1,Paris, Texas\tEMPTYCAND\tGT:\t1,22989,0.9,Paris";
        let parsed = parse_ganea_line(line).unwrap();
        assert_eq!(parsed.alias, "paris");
        assert_eq!(parsed.candidates.len(), 2);
        assert_eq!(parsed.candidates[1].title, "Paris, Texas");
        assert!(parse_ganea_line("a\tb\tc").is_err());
    }

    #[test]
    fn import_resolves_sorts_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aida_testA.csv");
        fs::write(
            &path,
            "d\td\tParis\tl\tr\tCANDIDATES\t999,0.2,Nowhere\t22989,0.7,Paris, France\t1,0.1,Lost\t5,0.5,Paris\tGT:\t-1\n",
        )
        .unwrap();
        let r = resolver().with_title("Paris", "Q90").with_page("5", "Q5");
        let import = import_ganea_candidates(&[path], &r, 2).unwrap();
        let paris = &import.candidates["paris"];
        // "Paris, France" and "Paris" both resolve to Q90; the first one listed stays.
        assert_eq!(
            paris,
            &vec![Candidate::new("Q90", 0.7), Candidate::new("Q999", 0.2)]
        );
        assert!(import.unresolved_pages.contains("1"));
        assert_eq!(import.resolved_by[&ResolutionStrategy::Title], 1);
        assert_eq!(import.lines, 1);

        let out = dir.path().join("out/cands.json");
        import.save(&out).unwrap();
        let text = fs::read_to_string(out).unwrap();
        assert!(text.contains(r#""paris":[["Q90",0.7],["Q999",0.2]]"#));
    }
}
