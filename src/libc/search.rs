//! End-to-end libc search
//!
//! [`LibcSearch`] ties the pieces together: it selects a backend, asks it for
//! candidates, verifies every candidate's symbol table in parallel and keeps
//! the deduplicated survivors as its [`LibraryCatalog`]. Downloading the
//! matching binaries is a separate, on-demand step.

use super::backend::{select_backend, Backend};
use super::catalog::{LibraryCatalog, ResolvedLibrary};
use super::download::{fetch_library, DownloadReport};
use super::symbols::ConstraintSet;
use super::verify::verify_candidate;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::runner::{ProgressSnapshot, TaskFailure, TaskRunner};
use crate::transport::{ArtifactStore, DirectoryStore, ReqwestTransport, Transport};
use log::info;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A completed search and its verified catalog
pub struct LibcSearch {
    transport: Arc<dyn Transport>,
    config: SearchConfig,
    constraints: ConstraintSet,
    backend: Backend,
    catalog: LibraryCatalog,
    rejected: Vec<TaskFailure<SearchError>>,
    verification: ProgressSnapshot,
}

impl LibcSearch {
    /// Search the default backends for builds matching `names` observed at
    /// `addresses` (hex, `0x` prefix optional), paired positionally.
    pub async fn new<N, A>(names: &[N], addresses: &[A]) -> Result<Self, SearchError>
    where
        N: AsRef<str>,
        A: AsRef<str>,
    {
        Self::with_config(names, addresses, SearchConfig::default()).await
    }

    pub async fn with_config<N, A>(
        names: &[N],
        addresses: &[A],
        config: SearchConfig,
    ) -> Result<Self, SearchError>
    where
        N: AsRef<str>,
        A: AsRef<str>,
    {
        let constraints = ConstraintSet::from_lists(names, addresses)?;
        let transport =
            ReqwestTransport::new(&config).map_err(|e| SearchError::Config(e.to_string()))?;
        Self::resolve(Arc::new(transport), config, constraints).await
    }

    /// Run a search over an explicit transport.
    pub async fn resolve(
        transport: Arc<dyn Transport>,
        config: SearchConfig,
        constraints: ConstraintSet,
    ) -> Result<Self, SearchError> {
        config.validate()?;

        let backend =
            select_backend(transport.as_ref(), &config.backends, config.probe_timeout()).await?;
        let candidates = backend.resolve(transport.as_ref(), &constraints).await?;

        let symbols: Arc<Vec<String>> = Arc::new(
            constraints
                .symbol_names()
                .into_iter()
                .map(String::from)
                .collect(),
        );

        let runner = TaskRunner::new(config.max_workers, "Scraped");
        let report = {
            let transport = Arc::clone(&transport);
            let backend = backend.clone();
            runner
                .run(candidates, move |candidate| {
                    let transport = Arc::clone(&transport);
                    let backend = backend.clone();
                    let symbols = Arc::clone(&symbols);
                    async move {
                        verify_candidate(transport.as_ref(), &backend, &candidate, &symbols).await
                    }
                })
                .await
        };

        if let Some(fatal) = report.failures.iter().find_map(|f| match f {
            TaskFailure::Failed { error, .. } if error.is_fatal() => Some(error.clone()),
            _ => None,
        }) {
            return Err(fatal);
        }

        let catalog = LibraryCatalog::deduplicate(report.completed, config.dedup);
        info!(
            "{} libc build(s) match {} ({} rejected)",
            catalog.len(),
            constraints,
            report.failures.len()
        );

        Ok(Self {
            transport,
            config,
            constraints,
            backend,
            catalog,
            rejected: report.failures,
            verification: report.progress,
        })
    }

    pub fn catalog(&self) -> &LibraryCatalog {
        &self.catalog
    }

    pub fn libraries(&self) -> &[ResolvedLibrary] {
        self.catalog.libraries()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Candidates dropped during verification and why
    pub fn rejected(&self) -> &[TaskFailure<SearchError>] {
        &self.rejected
    }

    pub fn verification_progress(&self) -> ProgressSnapshot {
        self.verification
    }

    /// Download every catalog entry into the current directory and return
    /// the file names now present.
    pub async fn download(&self) -> Vec<String> {
        self.download_to(".").await.files
    }

    pub async fn download_to(&self, dir: impl Into<PathBuf>) -> DownloadReport {
        self.download_into(Arc::new(DirectoryStore::new(dir))).await
    }

    /// Download every catalog entry into `store`.
    ///
    /// Failed downloads are reported and left out of `files`; they never
    /// stop the others.
    pub async fn download_into(&self, store: Arc<dyn ArtifactStore>) -> DownloadReport {
        let file_names: Vec<String> = self.catalog.iter().map(|l| l.file_name()).collect();
        let runner = TaskRunner::new(self.config.max_workers, "Downloaded");

        let transport = Arc::clone(&self.transport);
        let backend = self.backend.clone();
        let report = runner
            .run(file_names, move |file_name| {
                let transport = Arc::clone(&transport);
                let store = Arc::clone(&store);
                let backend = backend.clone();
                async move {
                    fetch_library(transport.as_ref(), store.as_ref(), &backend, &file_name).await
                }
            })
            .await;

        DownloadReport {
            files: report.completed,
            failures: report.failures,
            progress: report.progress,
        }
    }
}

impl fmt::Display for LibcSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<LibcSearch ({}) via {}: {} match(es)>",
            self.constraints,
            self.backend.base_url(),
            self.catalog.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BackendEndpoint, BackendKind, DedupKey, BLUKAT_BASE_URL, RIP_BASE_URL,
    };
    use crate::transport::mock::{MockTransport, Reply, Request};

    fn blukat_up() -> MockTransport {
        MockTransport::new().on_head(BLUKAT_BASE_URL, Reply::Status(200, Vec::new()))
    }

    fn rip_only() -> MockTransport {
        MockTransport::new()
            .on_head(BLUKAT_BASE_URL, Reply::Timeout)
            .on_head(RIP_BASE_URL, Reply::Status(200, Vec::new()))
    }

    fn rip_find_response(ids: &[&str]) -> String {
        let entries: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "symbols_url": format!("https://libc.rip/download/{}.symbols", id),
                })
            })
            .collect();
        serde_json::to_string(&entries).unwrap()
    }

    #[tokio::test]
    async fn test_candidate_missing_symbol_is_dropped() {
        let transport = Arc::new(
            blukat_up()
                .on_get(
                    "https://libc.blukat.me/?q=puts:7f10101010",
                    200,
                    "<a>libc6_2.27-3ubuntu1_amd64</a> <a>libc6_2.23-0ubuntu11_i386</a>",
                )
                .on_get(
                    "https://libc.blukat.me/d/libc6_2.27-3ubuntu1_amd64.symbols",
                    200,
                    "gets 7e8a0\nputs 5f0a0\n",
                )
                .on_get(
                    "https://libc.blukat.me/d/libc6_2.23-0ubuntu11_i386.symbols",
                    200,
                    "gets 5e890\nprintf 49670\n",
                ),
        );
        let constraints = ConstraintSet::from_lists(&["puts"], &["0x7f10101010"]).unwrap();

        let search = LibcSearch::resolve(transport, SearchConfig::default(), constraints)
            .await
            .unwrap();

        assert_eq!(search.catalog().len(), 1);
        let libc = &search.libraries()[0];
        assert_eq!(libc.name(), "libc6_2.27-3ubuntu1_amd64");
        assert_eq!(libc.offset("puts").unwrap(), 0x5f0a0);

        assert_eq!(search.rejected().len(), 1);
        assert!(matches!(
            &search.rejected()[0],
            TaskFailure::Failed {
                error: SearchError::SymbolMissing { .. },
                ..
            }
        ));
        assert_eq!(
            search.verification_progress(),
            ProgressSnapshot { done: 2, total: 2 }
        );
    }

    #[tokio::test]
    async fn test_identical_offsets_yield_single_entry() {
        let transport = Arc::new(
            rip_only()
                .on_post(
                    "https://libc.rip/api/find",
                    200,
                    rip_find_response(&["libc6_2.27-3ubuntu1_amd64", "libc6_2.27-3ubuntu1.2_amd64"]),
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.27-3ubuntu1_amd64.symbols",
                    200,
                    "puts 809c0\n",
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.27-3ubuntu1.2_amd64.symbols",
                    200,
                    "puts 809c0\n",
                ),
        );
        let config = SearchConfig {
            dedup: DedupKey::Offsets,
            ..Default::default()
        };
        let constraints = ConstraintSet::from_specs(&["puts=0x7f00000809c0"]).unwrap();

        let search = LibcSearch::resolve(transport, config, constraints)
            .await
            .unwrap();

        assert_eq!(search.catalog().len(), 1);
        assert!([
            "libc6_2.27-3ubuntu1_amd64",
            "libc6_2.27-3ubuntu1.2_amd64"
        ]
        .contains(&search.libraries()[0].name()));
        assert!(search.rejected().is_empty());
    }

    #[tokio::test]
    async fn test_default_dedup_keeps_builds_differing_elsewhere() {
        let transport = Arc::new(
            rip_only()
                .on_post(
                    "https://libc.rip/api/find",
                    200,
                    rip_find_response(&["libc6_2.27-3ubuntu1_amd64", "libc6_2.27-3ubuntu1.4_amd64"]),
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.27-3ubuntu1_amd64.symbols",
                    200,
                    "puts 809c0\nsystem 4f440\n",
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.27-3ubuntu1.4_amd64.symbols",
                    200,
                    "puts 809c0\nsystem 4f550\n",
                ),
        );
        let constraints = ConstraintSet::from_specs(&["puts=0x7f00000809c0"]).unwrap();

        let search = LibcSearch::resolve(transport, SearchConfig::default(), constraints)
            .await
            .unwrap();

        let mut names: Vec<&str> = search.libraries().iter().map(|l| l.name()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec!["libc6_2.27-3ubuntu1.4_amd64", "libc6_2.27-3ubuntu1_amd64"]
        );
    }

    #[tokio::test]
    async fn test_strict_dedup_keeps_distinct_identifiers() {
        let transport = Arc::new(
            rip_only()
                .on_post(
                    "https://libc.rip/api/find",
                    200,
                    rip_find_response(&["libc6_2.27-3ubuntu1_amd64", "libc6_2.27-3ubuntu1.2_amd64"]),
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.27-3ubuntu1_amd64.symbols",
                    200,
                    "puts 809c0\n",
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.27-3ubuntu1.2_amd64.symbols",
                    200,
                    "puts 809c0\n",
                ),
        );
        let config = SearchConfig {
            dedup: DedupKey::IdentifierAndOffsets,
            ..Default::default()
        };
        let constraints = ConstraintSet::from_specs(&["puts=0x7f00000809c0"]).unwrap();

        let search = LibcSearch::resolve(transport, config, constraints)
            .await
            .unwrap();
        assert_eq!(search.catalog().len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_backend_uses_its_query_shape() {
        let transport = Arc::new(rip_only().on_post(
            "https://libc.rip/api/find",
            200,
            rip_find_response(&["libc6_2.31-0ubuntu9_amd64"]),
        ).on_get(
            "https://libc.rip/download/libc6_2.31-0ubuntu9_amd64.symbols",
            200,
            "puts 875a0\nstr_bin_sh 1b75aa\n",
        ));
        let constraints = ConstraintSet::from_lists(&["puts"], &["0x7f4a5d6875a0"]).unwrap();

        let search = LibcSearch::resolve(
            Arc::clone(&transport) as Arc<dyn Transport>,
            SearchConfig::default(),
            constraints,
        )
        .await
        .unwrap();

        assert_eq!(search.backend().kind(), BackendKind::Rip);
        assert_eq!(
            transport.requests()[..3],
            [
                Request::Head(BLUKAT_BASE_URL.to_string()),
                Request::Head(RIP_BASE_URL.to_string()),
                Request::Post(
                    "https://libc.rip/api/find".to_string(),
                    serde_json::json!({"symbols": {"puts": "7f4a5d6875a0"}}),
                ),
            ]
        );
        assert!(!transport
            .requests()
            .iter()
            .any(|r| matches!(r, Request::Get(url) if url.contains("?q="))));
    }

    #[tokio::test]
    async fn test_offset_maps_hold_exactly_requested_symbols() {
        let transport = Arc::new(
            blukat_up()
                .on_get(
                    "https://libc.blukat.me/?q=puts:7f4a5d6875a0",
                    200,
                    "libc6_2.31-0ubuntu9_amd64",
                )
                .on_get(
                    "https://libc.blukat.me/d/libc6_2.31-0ubuntu9_amd64.symbols",
                    200,
                    "puts 875a0\nsystem 55410\nstr_bin_sh 1b75aa\ngets 86af0\n",
                ),
        );
        let constraints =
            ConstraintSet::from_lists(&["puts", "binsh", "system"], &["0x7f4a5d6875a0"]).unwrap();

        let search = LibcSearch::resolve(transport, SearchConfig::default(), constraints)
            .await
            .unwrap();

        let libc = &search.libraries()[0];
        let keys: Vec<&str> = libc.offsets().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["puts", "str_bin_sh", "system"]);
        assert_eq!(libc.offset("binsh").unwrap(), 0x1b75aa);
        assert_eq!(libc.offset("binsh"), libc.offset("str_bin_sh"));
        assert!(libc.offset("gets").is_err());
    }

    #[tokio::test]
    async fn test_no_backend_aborts_before_any_query() {
        let transport = Arc::new(
            MockTransport::new()
                .on_head(BLUKAT_BASE_URL, Reply::Timeout)
                .on_head(RIP_BASE_URL, Reply::Status(502, Vec::new())),
        );
        let constraints = ConstraintSet::from_specs(&["puts=0x7f10101010"]).unwrap();

        let result = LibcSearch::resolve(
            Arc::clone(&transport) as Arc<dyn Transport>,
            SearchConfig::default(),
            constraints,
        )
        .await;

        assert!(matches!(result, Err(SearchError::BackendUnavailable { .. })));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_candidate_query_is_fatal() {
        let transport = Arc::new(rip_only().on_post("https://libc.rip/api/find", 500, ""));
        let constraints = ConstraintSet::from_specs(&["puts=0x7f10101010"]).unwrap();

        let result = LibcSearch::resolve(transport, SearchConfig::default(), constraints).await;
        assert!(matches!(result, Err(SearchError::BackendRequestFailed { .. })));
    }

    #[tokio::test]
    async fn test_no_matches_is_success() {
        let transport =
            Arc::new(rip_only().on_post("https://libc.rip/api/find", 200, "[]"));
        let constraints = ConstraintSet::from_specs(&["puts=0x7f10101010"]).unwrap();

        let search = LibcSearch::resolve(transport, SearchConfig::default(), constraints)
            .await
            .unwrap();
        assert!(search.catalog().is_empty());
        assert_eq!(search.verification_progress().percent(), 100.0);

        let dir = tempfile::tempdir().unwrap();
        let report = search.download_to(dir.path()).await;
        assert!(report.files.is_empty());
        assert!(report.progress.is_complete());
    }

    #[tokio::test]
    async fn test_download_skips_present_and_isolates_failures() {
        let ids = [
            "libc6_2.27-3ubuntu1_amd64",
            "libc6_2.31-0ubuntu9_amd64",
            "libc6_2.23-0ubuntu11_amd64",
        ];
        let transport = Arc::new(
            rip_only()
                .on_post("https://libc.rip/api/find", 200, rip_find_response(&ids))
                .on_get(
                    "https://libc.rip/download/libc6_2.27-3ubuntu1_amd64.symbols",
                    200,
                    "puts 809c0\n",
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.31-0ubuntu9_amd64.symbols",
                    200,
                    "puts 875a0\n",
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.23-0ubuntu11_amd64.symbols",
                    200,
                    "puts 6f690\n",
                )
                .on_get(
                    "https://libc.rip/download/libc6_2.31-0ubuntu9_amd64.so",
                    200,
                    b"\x7fELF".to_vec(),
                ),
        );
        let constraints = ConstraintSet::from_specs(&["puts=0x7f00000009c0"]).unwrap();

        let search = LibcSearch::resolve(
            Arc::clone(&transport) as Arc<dyn Transport>,
            SearchConfig::default(),
            constraints,
        )
        .await
        .unwrap();
        assert_eq!(search.catalog().len(), 3);
        assert!(search.verification_progress().is_complete());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libc6_2.27-3ubuntu1_amd64.so"), b"cached").unwrap();

        let report = search.download_to(dir.path()).await;

        let mut files = report.files.clone();
        files.sort();
        assert_eq!(
            files,
            vec!["libc6_2.27-3ubuntu1_amd64.so", "libc6_2.31-0ubuntu9_amd64.so"]
        );
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            TaskFailure::Failed {
                error: SearchError::DownloadFailed { .. },
                ..
            }
        ));
        assert_eq!(report.progress, ProgressSnapshot { done: 3, total: 3 });
        assert_eq!(report.progress.percent(), 100.0);

        assert!(!transport.requested("https://libc.rip/download/libc6_2.27-3ubuntu1_amd64.so"));
        assert_eq!(
            std::fs::read(dir.path().join("libc6_2.31-0ubuntu9_amd64.so")).unwrap(),
            b"\x7fELF"
        );
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_probing() {
        let transport = Arc::new(MockTransport::new());
        let config = SearchConfig {
            backends: Vec::new(),
            ..Default::default()
        };

        let result = LibcSearch::resolve(
            Arc::clone(&transport) as Arc<dyn Transport>,
            config,
            ConstraintSet::default(),
        )
        .await;
        assert!(matches!(result, Err(SearchError::Config(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_display() {
        let transport = Arc::new(
            MockTransport::new()
                .on_head(BLUKAT_BASE_URL, Reply::Status(200, Vec::new())),
        );
        let config = SearchConfig {
            backends: vec![BackendEndpoint::new(BackendKind::Blukat, BLUKAT_BASE_URL)],
            ..Default::default()
        };
        let constraints = ConstraintSet::from_specs(&["binsh"]).unwrap();

        let search = LibcSearch::resolve(transport, config, constraints)
            .await
            .unwrap();
        assert_eq!(
            search.to_string(),
            "<LibcSearch (str_bin_sh) via https://libc.blukat.me/: 0 match(es)>"
        );
    }
}
