use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::auth::repo_types::User;
use crate::dynamo::{self, Item};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Exact-key lookup.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Unconditional upsert. Callers check for an existing email first.
    async fn create(&self, user: &User) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct DynamoUserRepo {
    client: Client,
    table: String,
}

impl DynamoUserRepo {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl UserRepo for DynamoUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let out = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("email", dynamo::s(email))
            .send()
            .await
            .context("dynamodb get_item users")?;

        out.item().map(user_from_item).transpose()
    }

    async fn create(&self, user: &User) -> anyhow::Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(user_to_item(user)?))
            .send()
            .await
            .context("dynamodb put_item users")?;
        Ok(())
    }
}

pub(crate) fn user_to_item(user: &User) -> anyhow::Result<Item> {
    let mut item = Item::new();
    item.insert("email".into(), dynamo::s(&user.email));
    item.insert("name".into(), dynamo::s(&user.name));
    item.insert("passwordHash".into(), dynamo::s(&user.password_hash));
    item.insert(
        "createdAt".into(),
        dynamo::s(user.created_at.format(&Rfc3339).context("format createdAt")?),
    );
    Ok(item)
}

pub(crate) fn user_from_item(item: &Item) -> anyhow::Result<User> {
    let created_at = dynamo::get_s(item, "createdAt")?;
    Ok(User {
        email: dynamo::get_s(item, "email")?,
        name: dynamo::get_opt_s(item, "name")?.unwrap_or_default(),
        password_hash: dynamo::get_opt_s(item, "passwordHash")?.unwrap_or_default(),
        created_at: OffsetDateTime::parse(&created_at, &Rfc3339)
            .with_context(|| format!("parse createdAt {created_at:?}"))?,
    })
}
