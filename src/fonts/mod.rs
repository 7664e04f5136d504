//! Font repository: discovers, fetches, identifies, decompresses and parses
//! font binaries, and answers family lookups and glyph-outline queries.
//!
//! The cache is insert-once per normalized family key. A family whose fetch
//! or decode fails is simply absent, so text in that family falls back to a
//! system-font text run.

mod fetch;
mod format;
mod outline;
mod sfnt;
mod woff;
mod woff2;

#[cfg(test)]
pub(crate) mod fixtures;

#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{decode_data_uri, is_data_uri, FontFetcher, OfflineFetcher};
pub use format::{detect_format, FontFormat};
pub use outline::{to_path_data, PathCommand};

use crate::{Error, Result};
use log::{debug, warn};
use outline::GlyphOutline;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// An external `@font-face` declaration visible to the captured style context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontFaceDecl {
    pub family_name: String,
    pub source_url: String,
}

impl FontFaceDecl {
    pub fn new(family_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            source_url: source_url.into(),
        }
    }
}

/// Normalize one family name: trim, strip surrounding quotes, lowercase.
pub fn normalize_family(name: &str) -> String {
    unquote(name).to_lowercase()
}

fn unquote(name: &str) -> &str {
    let mut s = name.trim();
    loop {
        let unquoted = ['"', '\'']
            .into_iter()
            .find_map(|q| s.strip_prefix(q).and_then(|r| r.strip_suffix(q)));
        match unquoted {
            Some(inner) => s = inner.trim(),
            None => return s,
        }
    }
}

/// Normalize every entry of a comma-separated family list, dropping empties.
pub fn normalize_family_list(list: &str) -> Vec<String> {
    crate::css::split_top_level(list, ',')
        .into_iter()
        .map(normalize_family)
        .filter(|f| !f.is_empty())
        .collect()
}

/// A parsed font held by the repository.
///
/// The raw bytes are kept exactly as fetched for re-embedding; the decoded
/// sfnt is what the outline parser reads. Glyph outlines are extracted on
/// first use and memoized per character.
#[derive(Debug)]
pub struct FontEntry {
    family_name: String,
    family_key: String,
    source: String,
    format: FontFormat,
    raw: Vec<u8>,
    sfnt: Option<Vec<u8>>,
    units_per_em: u16,
    outlines: Mutex<HashMap<char, GlyphOutline>>,
}

impl FontEntry {
    /// Identify, decode and parse `raw`.
    pub fn from_bytes(family: &str, source: impl Into<String>, raw: Vec<u8>) -> Result<FontEntry> {
        let format = detect_format(&raw)?;
        let sfnt = match format {
            FontFormat::Woff2 => Some(woff2::decode(&raw)?),
            FontFormat::Woff => Some(woff::decode(&raw)?),
            FontFormat::Ttf | FontFormat::Otf => None,
        };
        let units_per_em = {
            let data = sfnt.as_deref().unwrap_or(&raw);
            let face = ttf_parser::Face::parse(data, 0).map_err(|e| Error::FontParseError(e.to_string()))?;
            face.units_per_em()
        };
        Ok(FontEntry {
            family_name: unquote(family).to_string(),
            family_key: normalize_family(family),
            source: source.into(),
            format,
            raw,
            sfnt,
            units_per_em,
            outlines: Mutex::new(HashMap::new()),
        })
    }

    /// Family as declared, without quotes.
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn family_key(&self) -> &str {
        &self.family_key
    }

    /// URL or data URI the bytes came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> FontFormat {
        self.format
    }

    /// Bytes as fetched, possibly compressed.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Uncompressed outline tables.
    pub fn sfnt_bytes(&self) -> &[u8] {
        self.sfnt.as_deref().unwrap_or(&self.raw)
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Path commands drawing `text` with the first glyph's origin at
    /// `(pen_x, pen_y)`, scaled to `font_size` pixels. Each following glyph
    /// starts at the previous one's advance; there is no kerning or shaping.
    pub fn glyph_outline(&self, text: &str, pen_x: f32, pen_y: f32, font_size: f32) -> Vec<PathCommand> {
        let mut commands = Vec::new();
        let mut memo = match self.outlines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Parsed once per call; the entry was validated at construction.
        let face = ttf_parser::Face::parse(self.sfnt_bytes(), 0).ok();
        let mut x = pen_x;
        for ch in text.chars() {
            if !memo.contains_key(&ch) {
                let Some(face) = &face else { break };
                memo.insert(ch, outline::extract(face, ch));
            }
            let Some(glyph) = memo.get(&ch) else { break };
            x += outline::place(glyph, x, pen_y, font_size, self.units_per_em, &mut commands);
        }
        commands
    }
}

/// Session-scoped font cache.
pub struct FontRepository {
    fetcher: Arc<dyn FontFetcher>,
    entries: RwLock<HashMap<String, Arc<FontEntry>>>,
    pending: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for FontRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRepository")
            .field("families", &self.families())
            .finish()
    }
}

impl Default for FontRepository {
    fn default() -> Self {
        Self::new(OfflineFetcher)
    }
}

impl FontRepository {
    pub fn new(fetcher: impl FontFetcher + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            entries: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Repository fetching remote fonts over HTTP.
    #[cfg(feature = "http")]
    pub fn with_http(config: &crate::FetchConfig) -> Result<Self> {
        Ok(Self::new(HttpFetcher::new(config)?))
    }

    /// Fetch, decode and cache every declaration whose family is not cached
    /// yet. All fetches are issued together and awaited jointly; a failure
    /// only drops its own family. Returns the number of families added.
    pub async fn refresh(&self, declarations: &[FontFaceDecl]) -> usize {
        let claimed: Vec<(String, &FontFaceDecl)> = declarations
            .iter()
            .filter_map(|decl| {
                let key = normalize_family(&decl.family_name);
                (!key.is_empty() && self.claim(&key)).then_some((key, decl))
            })
            .collect();
        if claimed.is_empty() {
            return 0;
        }
        debug!("Refreshing {} font families", claimed.len());

        let loads = claimed
            .iter()
            .map(|(_, decl)| self.load(decl));
        let results = futures::future::join_all(loads).await;

        let mut added = 0;
        for ((key, decl), result) in claimed.iter().zip(results) {
            match result {
                Ok(entry) => {
                    if self.insert(Arc::new(entry)) {
                        added += 1;
                    }
                }
                Err(e @ Error::FetchError { .. }) => warn!("Skipping font family {}: {}", decl.family_name, e),
                Err(e) if e.is_font_pipeline() => debug!("Skipping font family {}: {}", decl.family_name, e),
                Err(e) => warn!("Unexpected error loading font family {}: {}", decl.family_name, e),
            }
            self.release(key);
        }
        added
    }

    async fn load(&self, decl: &FontFaceDecl) -> Result<FontEntry> {
        let bytes = if is_data_uri(&decl.source_url) {
            decode_data_uri(&decl.source_url)?
        } else {
            self.fetcher.fetch(&decl.source_url).await?
        };
        FontEntry::from_bytes(&decl.family_name, decl.source_url.clone(), bytes)
    }

    /// Mark `key` as being loaded. False when it is cached or already in
    /// flight in an overlapping refresh.
    fn claim(&self, key: &str) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        !self.contains(key) && pending.insert(key.to_string())
    }

    fn release(&self, key: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(key);
        }
    }

    /// Insert unless the key is present. The first writer wins.
    fn insert(&self, entry: Arc<FontEntry>) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };
        if entries.contains_key(entry.family_key()) {
            return false;
        }
        debug!(
            "Cached font family {} ({}, {} bytes) from {}",
            entry.family_key(),
            entry.format().css_format(),
            entry.raw_bytes().len(),
            fetch::truncate_locator(entry.source())
        );
        entries.insert(entry.family_key().to_string(), entry);
        true
    }

    /// Decode bytes the host already holds and cache them under `family`.
    /// Returns the cached entry, which is the earlier one if the family was
    /// already present.
    pub fn add_bytes(&self, family: &str, source: &str, bytes: Vec<u8>) -> Result<Arc<FontEntry>> {
        let entry = Arc::new(FontEntry::from_bytes(family, source, bytes)?);
        self.insert(entry.clone());
        Ok(self.get(entry.family_key()).unwrap_or(entry))
    }

    /// First cached entry matching a family in the comma-separated list.
    pub fn lookup(&self, family_list: &str) -> Option<Arc<FontEntry>> {
        let entries = self.entries.read().ok()?;
        normalize_family_list(family_list)
            .iter()
            .find_map(|family| entries.get(family).cloned())
    }

    fn get(&self, key: &str) -> Option<Arc<FontEntry>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn contains(&self, family: &str) -> bool {
        self.get(&normalize_family(family)).is_some()
    }

    /// Cached family keys, sorted.
    pub fn families(&self) -> Vec<String> {
        let mut keys: Vec<String> = match self.entries.read() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    /// Every cached entry, sorted by family key.
    pub fn entries(&self) -> Vec<Arc<FontEntry>> {
        let mut all: Vec<Arc<FontEntry>> = match self.entries.read() {
            Ok(entries) => entries.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        all.sort_by(|a, b| a.family_key().cmp(b.family_key()));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed bytes per URL and counts requests.
    #[derive(Default)]
    struct MapFetcher {
        files: HashMap<String, Vec<u8>>,
        hits: AtomicUsize,
    }

    impl MapFetcher {
        fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
            self.files.insert(url.to_string(), bytes);
            self
        }
    }

    impl FontFetcher for Arc<MapFetcher> {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
            Box::pin(async move {
                self.hits.fetch_add(1, Ordering::SeqCst);
                self.files.get(url).cloned().ok_or_else(|| Error::FetchError {
                    url: url.to_string(),
                    reason: "404".into(),
                })
            })
        }
    }

    fn data_uri(bytes: &[u8]) -> String {
        format!(
            "data:font/ttf;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn family_normalization() {
        assert_eq!(normalize_family("  \"Fira Code\" "), "fira code");
        assert_eq!(normalize_family("'Arial'"), "arial");
        assert_eq!(normalize_family("ARIAL"), "arial");
        for input in ["\"'Nested'\"", "Helvetica Neue", "  'x' "] {
            let once = normalize_family(input);
            assert_eq!(normalize_family(&once), once);
        }
        assert_eq!(
            normalize_family_list("Helvetica, \"Arial\", , sans-serif"),
            vec!["helvetica", "arial", "sans-serif"]
        );
    }

    #[tokio::test]
    async fn lookup_follows_fallback_order() {
        let repo = FontRepository::default();
        let added = repo
            .refresh(&[FontFaceDecl::new("Arial", data_uri(&fixtures::square_font()))])
            .await;
        assert_eq!(added, 1);

        let a = repo.lookup("Arial").expect("cached");
        let b = repo.lookup("\"arial\"").expect("cached");
        let c = repo.lookup("ARIAL, Helvetica").expect("cached");
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert!(repo.lookup("Missing, 'Arial'").is_some());
        assert!(repo.lookup("Helvetica, sans-serif").is_none());
    }

    #[tokio::test]
    async fn refresh_fetches_each_family_once() {
        let fetcher = Arc::new(MapFetcher::default().with("https://f/a.woff", woff::encode(&fixtures::square_font())));
        let repo = FontRepository::new(fetcher.clone());
        let decls = vec![FontFaceDecl::new("A", "https://f/a.woff")];

        assert_eq!(repo.refresh(&decls).await, 1);
        assert_eq!(repo.refresh(&decls).await, 0);
        assert_eq!(fetcher.hits.load(Ordering::SeqCst), 1);
        assert_eq!(repo.lookup("a").unwrap().format(), FontFormat::Woff);
    }

    #[tokio::test]
    async fn overlapping_refreshes_share_one_fetch() {
        let fetcher = Arc::new(MapFetcher::default().with("https://f/a.ttf", fixtures::square_font()));
        let repo = FontRepository::new(fetcher.clone());
        let decls = vec![FontFaceDecl::new("A", "https://f/a.ttf")];

        let (first, second) = futures::join!(repo.refresh(&decls), repo.refresh(&decls));
        assert_eq!(first + second, 1);
        assert_eq!(fetcher.hits.load(Ordering::SeqCst), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_family() {
        let fetcher = Arc::new(
            MapFetcher::default()
                .with("https://f/good.woff2", woff2::encode::fixture_woff2(true))
                .with("https://f/garbage.ttf", b"not a font".to_vec())
                .with("https://f/broken.woff", b"wOFF\0\0\0\0".to_vec()),
        );
        let repo = FontRepository::new(fetcher);
        let decls = vec![
            FontFaceDecl::new("Missing", "https://f/missing.ttf"),
            FontFaceDecl::new("Garbage", "https://f/garbage.ttf"),
            FontFaceDecl::new("Broken", "https://f/broken.woff"),
            FontFaceDecl::new("Good", "https://f/good.woff2"),
            FontFaceDecl::new("Bad Data", "data:font/ttf;base64,!!"),
        ];
        assert_eq!(repo.refresh(&decls).await, 1);
        assert_eq!(repo.families(), vec!["good".to_string()]);

        // A failed family can be retried by a later refresh.
        let retry = vec![FontFaceDecl::new("Garbage", data_uri(&fixtures::square_font()))];
        assert_eq!(repo.refresh(&retry).await, 1);
    }

    #[test]
    fn claims_are_refused_while_pending_or_cached() {
        let repo = FontRepository::default();
        assert!(repo.claim("square"));
        assert!(!repo.claim("square"));
        repo.add_bytes("Square", "mem", fixtures::square_font()).unwrap();
        repo.release("square");
        assert!(!repo.claim("square"));
        assert!(repo.claim("other"));
    }

    #[test]
    fn entry_construction_reports_pipeline_errors() {
        assert!(matches!(
            FontEntry::from_bytes("x", "mem", b"\0\0\0\0".to_vec()),
            Err(Error::UnknownFontFormat(_))
        ));
        assert!(matches!(
            FontEntry::from_bytes("x", "mem", vec![0, 1, 0, 0, 0, 0]),
            Err(Error::FontParseError(_))
        ));
        assert!(matches!(
            FontEntry::from_bytes("x", "mem", b"wOF2garbage".to_vec()),
            Err(Error::DecompressionError(_))
        ));
    }

    #[test]
    fn glyph_outline_advances_between_characters() {
        let repo = FontRepository::default();
        let entry = repo.add_bytes("Square", "mem", fixtures::square_font()).unwrap();
        let commands = entry.glyph_outline("AB", 10.0, 20.0, 100.0);
        let moves: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                PathCommand::MoveTo { x, y } => Some((*x, *y)),
                _ => None,
            })
            .collect();
        assert_eq!(moves, vec![(10.0, 20.0), (70.0, 20.0)]);
        assert_eq!(entry.glyph_outline("AB", 10.0, 20.0, 100.0), commands);
        assert!(entry.glyph_outline("", 0.0, 0.0, 12.0).is_empty());
    }

    #[test]
    fn woff2_entry_keeps_raw_bytes_and_decodes_sfnt() {
        let raw = woff2::encode::fixture_woff2(true);
        let entry = FontEntry::from_bytes("'Square'", "mem", raw.clone()).unwrap();
        assert_eq!(entry.family_key(), "square");
        assert_eq!(entry.family_name(), "Square");
        assert_eq!(entry.format(), FontFormat::Woff2);
        assert_eq!(entry.raw_bytes(), raw.as_slice());
        assert_eq!(&entry.sfnt_bytes()[..4], &[0, 1, 0, 0]);
        assert_eq!(entry.units_per_em(), fixtures::UNITS_PER_EM);
    }
}
