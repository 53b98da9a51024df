//! Backfill `app.user_profiles` from the auth user directory

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::UserProfile;
use crate::seed::{SeedPolicy, SeedReport, seed_records};
use crate::traits::ReferenceStore;

/// Upper bound on pages, in case a directory never returns a short page
const MAX_PAGES: u32 = 10_000;

/// A user as reported by the auth directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<DirectoryUser> for UserProfile {
    fn from(user: DirectoryUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
        }
    }
}

/// Paginated source of auth users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// One page of users; pages start at 1
    async fn list_users(&self, page: u32, per_page: u32) -> anyhow::Result<Vec<DirectoryUser>>;
}

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("per_page must be at least 1")]
    InvalidPageSize,

    #[error("Listing users failed on page {page}: {source:#}")]
    Directory {
        page: u32,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub pages: u32,
    pub users_seen: usize,
    pub profiles: SeedReport,
}

/// Upsert one profile per directory user until a short page is returned
///
/// # Errors
///
/// Returns `InvalidPageSize` for `per_page == 0` and `Directory` when a page
/// cannot be fetched. Per-profile failures are collected in the report.
pub async fn backfill_profiles<D, S>(
    directory: &D,
    store: &S,
    per_page: u32,
    policy: SeedPolicy,
) -> Result<BackfillReport, BackfillError>
where
    D: UserDirectory + ?Sized,
    S: ReferenceStore + ?Sized,
{
    if per_page == 0 {
        return Err(BackfillError::InvalidPageSize);
    }

    let mut report = BackfillReport::default();

    for page in 1..=MAX_PAGES {
        let users = directory
            .list_users(page, per_page)
            .await
            .map_err(|source| BackfillError::Directory { page, source })?;

        let fetched = users.len();
        report.pages = page;
        report.users_seen = report.users_seen.saturating_add(fetched);
        tracing::info!(page, users = fetched, "Fetched user page");

        let profiles: Vec<UserProfile> = users.into_iter().map(UserProfile::from).collect();
        let page_report = seed_records(store, &profiles, policy).await;
        let aborted = page_report.aborted;
        report.profiles.merge(page_report);

        if aborted || u32::try_from(fetched).is_ok_and(|n| n < per_page) {
            break;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRepository;
    use crate::tables::AppTable;
    use std::sync::Mutex;

    struct PagedDirectory {
        users: Vec<DirectoryUser>,
        requests: Mutex<Vec<(u32, u32)>>,
        fail_on_page: Option<u32>,
    }

    impl PagedDirectory {
        fn with_users(count: usize) -> Self {
            let users = (0..count)
                .map(|i| DirectoryUser {
                    id: Uuid::new_v4(),
                    email: Some(format!("user{i}@example.com")),
                    full_name: Some(format!("User {i}")),
                    avatar_url: None,
                })
                .collect();
            Self {
                users,
                requests: Mutex::new(Vec::new()),
                fail_on_page: None,
            }
        }
    }

    #[async_trait]
    impl UserDirectory for PagedDirectory {
        async fn list_users(&self, page: u32, per_page: u32) -> anyhow::Result<Vec<DirectoryUser>> {
            self.requests.lock().unwrap().push((page, per_page));
            if self.fail_on_page == Some(page) {
                anyhow::bail!("503 Service Unavailable");
            }
            let start = usize::try_from((page - 1) * per_page).unwrap();
            Ok(self
                .users
                .iter()
                .skip(start)
                .take(usize::try_from(per_page).unwrap())
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_pages_until_short_page() {
        let directory = PagedDirectory::with_users(5);
        let repo = MockRepository::new();

        let report = backfill_profiles(&directory, &repo, 2, SeedPolicy::default())
            .await
            .unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.users_seen, 5);
        assert_eq!(report.profiles.inserted, 5);
        assert_eq!(repo.row_count(AppTable::UserProfiles), 5);
        assert_eq!(
            *directory.requests.lock().unwrap(),
            vec![(1, 2), (2, 2), (3, 2)]
        );
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let directory = PagedDirectory::with_users(4);
        let repo = MockRepository::new();

        let report = backfill_profiles(&directory, &repo, 2, SeedPolicy::default())
            .await
            .unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.users_seen, 4);
    }

    #[tokio::test]
    async fn test_rerun_updates_existing_profiles() {
        let directory = PagedDirectory::with_users(3);
        let repo = MockRepository::new();

        backfill_profiles(&directory, &repo, 10, SeedPolicy::default())
            .await
            .unwrap();
        let second = backfill_profiles(&directory, &repo, 10, SeedPolicy::default())
            .await
            .unwrap();

        assert_eq!(second.profiles.updated, 3);
        assert_eq!(repo.row_count(AppTable::UserProfiles), 3);
    }

    #[tokio::test]
    async fn test_directory_failure_names_page() {
        let mut directory = PagedDirectory::with_users(5);
        directory.fail_on_page = Some(2);
        let repo = MockRepository::new();

        let err = backfill_profiles(&directory, &repo, 2, SeedPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BackfillError::Directory { page: 2, .. }));
        assert_eq!(repo.row_count(AppTable::UserProfiles), 2);
    }

    #[tokio::test]
    async fn test_zero_page_size_is_rejected() {
        let directory = PagedDirectory::with_users(1);
        let repo = MockRepository::new();
        assert!(matches!(
            backfill_profiles(&directory, &repo, 0, SeedPolicy::default()).await,
            Err(BackfillError::InvalidPageSize)
        ));
    }
}
