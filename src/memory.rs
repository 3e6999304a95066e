//! In-process tables for `DATA_BACKEND=memory` and tests. Each operation
//! holds the table lock for its whole duration, which gives the same
//! single-key atomicity the managed store provides.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::{repo::UserRepo, repo_types::User};
use crate::blogs::{
    repo::BlogRepo,
    repo_types::{BlogPatch, BlogPost},
};

#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, user: &User) -> anyhow::Result<()> {
        self.users
            .write()
            .await
            .insert(user.email.clone(), user.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlogRepo {
    posts: RwLock<HashMap<String, BlogPost>>,
}

#[async_trait]
impl BlogRepo for MemoryBlogRepo {
    async fn put(&self, post: &BlogPost) -> anyhow::Result<()> {
        self.posts.write().await.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn scan(&self) -> anyhow::Result<Vec<BlogPost>> {
        Ok(self.posts.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<BlogPost>> {
        Ok(self.posts.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: &BlogPatch, updated_at: OffsetDateTime) -> anyhow::Result<bool> {
        match self.posts.write().await.get_mut(id) {
            Some(post) => {
                post.apply(patch, updated_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.posts.write().await.remove(id);
        Ok(())
    }

    async fn increment_views(&self, id: &str) -> anyhow::Result<bool> {
        match self.posts.write().await.get_mut(id) {
            Some(post) => {
                post.views += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
