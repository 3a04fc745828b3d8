//! Knowledge-product catalog lookups.
//!
//! The catalog is a flat JSON array fetched in full on every lookup; matching
//! happens locally.

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    pub name: String,
    pub description: String,
    pub link: String,
}

impl Product {
    /// Three-line summary returned to the caller.
    pub fn summary(&self) -> String {
        format!(
            "Product Name: {}\nDescription: {}\nLink: {}",
            self.name, self.description, self.link
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog service responded with {0}")]
    Rejected(reqwest::StatusCode),
}

/// A source for the full product catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KnowledgeCatalog: Send + Sync {
    async fn products(&self) -> Result<Vec<Product>, CatalogError>;
}

/// Finds the product whose name equals `name`, ignoring case.
pub fn find_product<'a>(products: &'a [Product], name: &str) -> Option<&'a Product> {
    let wanted = name.to_lowercase();
    products.iter().find(|p| p.name.to_lowercase() == wanted)
}

/// Catalog served as a JSON document over HTTP.
pub struct HttpKnowledgeCatalog {
    client: reqwest::Client,
    url: String,
}

impl HttpKnowledgeCatalog {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl KnowledgeCatalog for HttpKnowledgeCatalog {
    async fn products(&self) -> Result<Vec<Product>, CatalogError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Rejected(status));
        }

        Ok(response.json().await?)
    }
}
