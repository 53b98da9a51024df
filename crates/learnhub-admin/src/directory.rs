//! Auth user directory backed by the service-role Supabase client

use std::sync::Arc;

use async_trait::async_trait;
use learnhub_data::{DirectoryUser, UserDirectory};
use learnhub_supabase::{AuthUser, SupabaseClient};

pub struct SupabaseDirectory {
    client: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub const fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }
}

fn to_directory_user(user: AuthUser) -> DirectoryUser {
    DirectoryUser {
        id: user.id,
        full_name: user.full_name(),
        avatar_url: user.avatar_url(),
        email: user.email,
    }
}

#[async_trait]
impl UserDirectory for SupabaseDirectory {
    async fn list_users(&self, page: u32, per_page: u32) -> anyhow::Result<Vec<DirectoryUser>> {
        let users = self.client.list_users(page, per_page).await?;
        Ok(users.into_iter().map(to_directory_user).collect())
    }
}
