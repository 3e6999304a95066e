use std::collections::HashMap;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::blogs::repo_types::{BlogPatch, BlogPost, BlogStatus};
use crate::dynamo::{self, Item};

#[async_trait]
pub trait BlogRepo: Send + Sync {
    async fn put(&self, post: &BlogPost) -> anyhow::Result<()>;

    /// Full table read.
    async fn scan(&self) -> anyhow::Result<Vec<BlogPost>>;

    async fn get(&self, id: &str) -> anyhow::Result<Option<BlogPost>>;

    /// Writes only the fields present in `patch`, plus `updatedAt`.
    /// Returns `false` when no record with `id` exists at write time.
    async fn update(&self, id: &str, patch: &BlogPatch, updated_at: OffsetDateTime) -> anyhow::Result<bool>;

    /// Unconditional; deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> anyhow::Result<()>;

    /// Store-side `views += 1`, starting from 0 when unset. Returns `false`
    /// when the record does not exist.
    async fn increment_views(&self, id: &str) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct DynamoBlogRepo {
    client: Client,
    table: String,
}

impl DynamoBlogRepo {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl BlogRepo for DynamoBlogRepo {
    async fn put(&self, post: &BlogPost) -> anyhow::Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(blog_to_item(post)?))
            .send()
            .await
            .context("dynamodb put_item blogs")?;
        Ok(())
    }

    async fn scan(&self) -> anyhow::Result<Vec<BlogPost>> {
        let mut posts = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let out = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .context("dynamodb scan blogs")?;

            for item in out.items() {
                posts.push(blog_from_item(item)?);
            }

            match out.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(posts)
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<BlogPost>> {
        let out = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("id", dynamo::s(id))
            .send()
            .await
            .context("dynamodb get_item blogs")?;

        out.item().map(blog_from_item).transpose()
    }

    async fn update(&self, id: &str, patch: &BlogPatch, updated_at: OffsetDateTime) -> anyhow::Result<bool> {
        let stamp = updated_at.format(&Rfc3339).context("format updatedAt")?;
        let plan = build_update(patch, &stamp);

        let res = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("id", dynamo::s(id))
            .update_expression(plan.expression)
            .condition_expression("attribute_exists(#id)")
            .set_expression_attribute_names(Some(plan.names))
            .set_expression_attribute_values(Some(plan.values))
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Ok(false)
                } else {
                    Err(anyhow::Error::new(err).context("dynamodb update_item blogs"))
                }
            }
        }
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("id", dynamo::s(id))
            .send()
            .await
            .context("dynamodb delete_item blogs")?;
        Ok(())
    }

    async fn increment_views(&self, id: &str) -> anyhow::Result<bool> {
        let res = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("id", dynamo::s(id))
            .update_expression("SET #views = if_not_exists(#views, :zero) + :one")
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#views", "views")
            .expression_attribute_names("#id", "id")
            .expression_attribute_values(":zero", dynamo::n(0))
            .expression_attribute_values(":one", dynamo::n(1))
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Ok(false)
                } else {
                    Err(anyhow::Error::new(err).context("dynamodb increment views"))
                }
            }
        }
    }
}

/// An `UpdateItem` expression with its placeholder maps.
#[derive(Debug)]
pub(crate) struct UpdatePlan {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: Item,
}

#[derive(Default)]
struct UpdateBuilder {
    sets: Vec<String>,
    removes: Vec<String>,
    names: HashMap<String, String>,
    values: Item,
}

impl UpdateBuilder {
    fn set(&mut self, attr: &str, value: AttributeValue) {
        self.sets.push(format!("#{attr} = :{attr}"));
        self.names.insert(format!("#{attr}"), attr.to_string());
        self.values.insert(format!(":{attr}"), value);
    }

    fn remove(&mut self, attr: &str) {
        self.removes.push(format!("#{attr}"));
        self.names.insert(format!("#{attr}"), attr.to_string());
    }

    fn finish(self) -> UpdatePlan {
        let mut expression = format!("SET {}", self.sets.join(", "));
        if !self.removes.is_empty() {
            expression.push_str(" REMOVE ");
            expression.push_str(&self.removes.join(", "));
        }
        UpdatePlan {
            expression,
            names: self.names,
            values: self.values,
        }
    }
}

/// Visits only the fields present in the patch; `updatedAt` is always set
/// and `#id` is always mapped for the existence condition.
pub(crate) fn build_update(patch: &BlogPatch, updated_at: &str) -> UpdatePlan {
    let mut b = UpdateBuilder::default();

    if let Some(title) = &patch.title {
        b.set("title", dynamo::s(title));
    }
    if let Some(content) = &patch.content {
        b.set("content", dynamo::s(content));
    }
    match &patch.cover_image {
        Some(Some(url)) => b.set("coverImage", dynamo::s(url)),
        Some(None) => b.remove("coverImage"),
        None => {}
    }
    if let Some(tags) = &patch.tags {
        b.set("tags", dynamo::string_list(tags));
    }
    if let Some(status) = patch.status {
        b.set("status", dynamo::s(status.as_str()));
    }
    b.set("updatedAt", dynamo::s(updated_at));
    b.names.insert("#id".into(), "id".into());

    b.finish()
}

pub(crate) fn blog_to_item(post: &BlogPost) -> anyhow::Result<Item> {
    let mut item = Item::new();
    item.insert("id".into(), dynamo::s(&post.id));
    item.insert("title".into(), dynamo::s(&post.title));
    item.insert("content".into(), dynamo::s(&post.content));
    if let Some(cover) = &post.cover_image {
        item.insert("coverImage".into(), dynamo::s(cover));
    }
    item.insert("tags".into(), dynamo::string_list(&post.tags));
    item.insert("status".into(), dynamo::s(post.status.as_str()));
    item.insert("views".into(), dynamo::n(post.views));
    item.insert(
        "createdAt".into(),
        dynamo::s(post.created_at.format(&Rfc3339).context("format createdAt")?),
    );
    item.insert(
        "updatedAt".into(),
        dynamo::s(post.updated_at.format(&Rfc3339).context("format updatedAt")?),
    );
    Ok(item)
}

pub(crate) fn blog_from_item(item: &Item) -> anyhow::Result<BlogPost> {
    let status = match dynamo::get_opt_s(item, "status")? {
        None => BlogStatus::default(),
        Some(s) => BlogStatus::parse(&s).ok_or_else(|| anyhow!("unknown blog status {s:?}"))?,
    };
    let created_at = parse_ts(&dynamo::get_s(item, "createdAt")?)?;
    let updated_at = match dynamo::get_opt_s(item, "updatedAt")? {
        Some(ts) => parse_ts(&ts)?,
        None => created_at,
    };

    Ok(BlogPost {
        id: dynamo::get_s(item, "id")?,
        title: dynamo::get_opt_s(item, "title")?.unwrap_or_default(),
        content: dynamo::get_opt_s(item, "content")?.unwrap_or_default(),
        cover_image: dynamo::get_opt_s(item, "coverImage")?,
        tags: dynamo::get_string_list(item, "tags")?,
        status,
        views: dynamo::get_n_or_zero(item, "views")?,
        created_at,
        updated_at,
    })
}

fn parse_ts(value: &str) -> anyhow::Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).with_context(|| format!("parse timestamp {value:?}"))
}
