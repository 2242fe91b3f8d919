//! Fallback search: find the newest existing version older than a missing one.
//!
//! Candidates are every path matching `dir/<pattern><basename>`. Among them
//! the greatest one that sorts strictly before the missing physical path
//! wins. Ordering is plain byte-wise comparison of the full path.

use std::path::{Path, PathBuf};

use histfile_glob::expand;

use crate::rewrite::{prefixed, split_path};
use crate::vfs::{Filesystem, VfsGlobFs};

/// A configured fallback pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSearch {
    pattern: String,
}

impl FallbackSearch {
    /// `pattern` is glued directly in front of the basename, so it normally
    /// ends with the layout's separator (`-` for flat, `/` for nested).
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The glob that enumerates every version of `logical`.
    pub fn glob_for(&self, logical: &Path) -> PathBuf {
        let (dir, base) = split_path(logical);
        dir.join(prefixed(&self.pattern, "", &base))
    }

    /// Best older candidate for `logical`, given that `computed` is missing.
    ///
    /// Never fails: an unreadable or absent directory means no candidates.
    pub async fn find(&self, fs: &dyn Filesystem, logical: &Path, computed: &Path) -> Option<PathBuf> {
        let glob = self.glob_for(logical);
        let candidates = match expand(&VfsGlobFs(fs), &glob).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::debug!(glob = %glob.display(), error = %e, "fallback scan failed");
                return None;
            }
        };

        let chosen = select_older(candidates, computed);
        tracing::debug!(
            glob = %glob.display(),
            missing = %computed.display(),
            chosen = ?chosen,
            "fallback scan"
        );
        chosen
    }
}

/// Greatest candidate strictly less than `bound`.
fn select_older(mut candidates: Vec<PathBuf>, bound: &Path) -> Option<PathBuf> {
    candidates.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    candidates
        .into_iter()
        .filter(|c| c.as_os_str() < bound.as_os_str())
        .next_back()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;

    const FLAT: &str = "[0-9][0-9][0-9][0-9].[0-9][0-9].[0-9][0-9]-";

    async fn seeded() -> MemoryFs {
        let fs = MemoryFs::new();
        for name in ["./1983.01.01-f", "./1983.02.01-f", "./1983.03.01-f", "./1983.02.10-g"] {
            fs.write(Path::new(name), name.as_bytes()).await.unwrap();
        }
        fs
    }

    #[test]
    fn glob_is_scoped_to_the_logical_directory() {
        let search = FallbackSearch::new(FLAT);
        assert_eq!(
            search.glob_for(Path::new("reports/daily.csv")),
            PathBuf::from(format!("reports/{FLAT}daily.csv"))
        );
        assert_eq!(search.glob_for(Path::new("f")), PathBuf::from(format!("./{FLAT}f")));
    }

    #[test]
    fn picks_greatest_strictly_smaller() {
        let candidates = vec![
            PathBuf::from("./1983.03.01-f"),
            PathBuf::from("./1983.01.01-f"),
            PathBuf::from("./1983.02.01-f"),
        ];
        assert_eq!(
            select_older(candidates.clone(), Path::new("./1983.02.15-f")),
            Some(PathBuf::from("./1983.02.01-f"))
        );
        assert_eq!(
            select_older(candidates.clone(), Path::new("./1983.02.01-f")),
            Some(PathBuf::from("./1983.01.01-f"))
        );
        assert_eq!(select_older(candidates, Path::new("./1982.12.01-f")), None);
    }

    #[tokio::test]
    async fn finds_closest_older_version() {
        let fs = seeded().await;
        let search = FallbackSearch::new(FLAT);

        let found = search.find(&fs, Path::new("f"), Path::new("./1983.02.15-f")).await;
        assert_eq!(found, Some(PathBuf::from("./1983.02.01-f")));
    }

    #[tokio::test]
    async fn newer_than_everything_gets_latest() {
        let fs = seeded().await;
        let search = FallbackSearch::new(FLAT);

        let found = search.find(&fs, Path::new("f"), Path::new("./2000.01.01-f")).await;
        assert_eq!(found, Some(PathBuf::from("./1983.03.01-f")));
    }

    #[tokio::test]
    async fn older_than_everything_finds_nothing() {
        let fs = seeded().await;
        let search = FallbackSearch::new(FLAT);

        let found = search.find(&fs, Path::new("f"), Path::new("./1982.12.01-f")).await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn absent_directory_finds_nothing() {
        let fs = seeded().await;
        let search = FallbackSearch::new(FLAT);

        let found = search
            .find(&fs, Path::new("missing/f"), Path::new("missing/1983.02.15-f"))
            .await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn nested_layout_candidates() {
        let fs = MemoryFs::new();
        fs.write(Path::new("logs/2001.01.01/app.log"), b"jan").await.unwrap();
        fs.write(Path::new("logs/2001.03.01/app.log"), b"mar").await.unwrap();
        fs.mkdir(Path::new("logs/2001.02.01")).await.unwrap();

        let search = FallbackSearch::new("[0-9][0-9][0-9][0-9].[0-9][0-9].[0-9][0-9]/");
        let found = search
            .find(&fs, Path::new("logs/app.log"), Path::new("logs/2001.02.15/app.log"))
            .await;
        assert_eq!(found, Some(PathBuf::from("logs/2001.01.01/app.log")));
    }
}
