//! Broadcast recipient source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: i64,
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(id: i64) -> Self {
        Self { id, name: None }
    }
}

/// Supplies the recipient snapshot for one broadcast. Read once per run.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn list_recipients(&self) -> Result<Vec<Recipient>>;
}
