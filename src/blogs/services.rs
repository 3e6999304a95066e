use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::blogs::{
    repo::BlogRepo,
    repo_types::{BlogPatch, BlogPost, NewBlog},
};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct BlogService {
    repo: Arc<dyn BlogRepo>,
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Blog with ID {id} not found"))
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepo>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, fields: NewBlog) -> AppResult<BlogPost> {
        let post = BlogPost::new(fields, Uuid::new_v4().to_string(), OffsetDateTime::now_utc());
        self.repo.put(&post).await.map_err(|e| {
            error!(error = %e, "could not create blog post");
            AppError::Internal(e)
        })?;
        info!(id = %post.id, "blog post created");
        Ok(post)
    }

    /// Newest first.
    pub async fn find_all(&self) -> AppResult<Vec<BlogPost>> {
        let mut posts = self.repo.scan().await.map_err(|e| {
            error!(error = %e, "could not fetch blogs");
            AppError::Internal(e)
        })?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    pub async fn find_one(&self, id: &str) -> AppResult<BlogPost> {
        self.repo
            .get(id)
            .await
            .map_err(|e| {
                error!(error = %e, %id, "could not fetch blog");
                AppError::Internal(e)
            })?
            .ok_or_else(|| not_found(id))
    }

    pub async fn update(&self, id: &str, patch: &BlogPatch) -> AppResult<BlogPost> {
        self.find_one(id).await?;

        let written = self
            .repo
            .update(id, patch, OffsetDateTime::now_utc())
            .await
            .map_err(|e| {
                error!(error = %e, %id, "could not update blog");
                AppError::Internal(e)
            })?;
        if !written {
            // deleted between the existence check and the write
            warn!(%id, "blog vanished before update");
            return Err(not_found(id));
        }

        info!(%id, "blog post updated");
        self.find_one(id).await
    }

    pub async fn remove(&self, id: &str) -> AppResult<()> {
        self.repo.delete(id).await.map_err(|e| {
            error!(error = %e, %id, "could not delete blog");
            AppError::Internal(e)
        })?;
        info!(%id, "blog post deleted");
        Ok(())
    }

    /// Best effort: failures are logged, never returned.
    pub async fn increment_view(&self, id: &str) {
        match self.repo.increment_views(id).await {
            Ok(true) => debug!(%id, "view counted"),
            Ok(false) => debug!(%id, "view on missing blog ignored"),
            Err(e) => warn!(error = %e, %id, "failed to increment view count"),
        }
    }
}
