//! Feed operations: find, create, update, delete.
//!
//! A [`FeedsApi`] is scoped to a context path: `/feeds` for the root scope,
//! `/{username}` for another user's feeds, or `/feeds/{parent}` for the
//! children of a feed. Every operation maps onto one request over the pooled
//! TCP transport and translates the response status.
//!
//! | Operation | Method | Success status |
//! |-----------|--------|----------------|
//! | `find` | GET | 200 (404 → `None`) |
//! | `create` | POST | 201 |
//! | `update` | PUT | 204 |
//! | `delete` | DELETE | 200 or 204 |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::debug;

use crate::client::FeedClient;
use crate::entity::Feed;
use crate::error::{Error, Result};
use crate::protocol::Request;

// ============================================================================
// FeedsApi
// ============================================================================

/// Feed operations scoped to one context path.
///
/// Created by [`FeedClient::feeds`] and friends; borrows the client.
pub struct FeedsApi<'a> {
    client: &'a FeedClient,
    context: String,
}

impl<'a> FeedsApi<'a> {
    /// Creates a scope over `context`; empty means the root `/feeds`.
    pub(crate) fn new(client: &'a FeedClient, context: &str) -> Self {
        let context = if context.is_empty() {
            "/feeds".to_string()
        } else if context.starts_with('/') {
            context.to_string()
        } else {
            format!("/{context}")
        };

        Self { client, context }
    }

    /// Returns the context path this scope addresses.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    fn resource(&self, path: &str) -> String {
        format!("{}/{}", self.context, path.trim_start_matches('/'))
    }
}

// ============================================================================
// FeedsApi - Operations
// ============================================================================

impl FeedsApi<'_> {
    /// Fetches a feed by path, e.g. `office` or `office/temperature`.
    ///
    /// Returns `Ok(None)` if the feed does not exist.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::ConnectionClosed`] if the transport is lost mid-call
    /// - [`Error::Status`] for any other non-success status
    pub async fn find(&self, path: &str) -> Result<Option<Feed>> {
        let resource = self.resource(path);
        let response = self.client.execute(Request::new("GET", &resource)).await?;

        match response.status {
            200 => {
                let feed = serde_json::from_value(response.body.unwrap_or(Value::Null))?;
                Ok(Some(feed))
            }
            404 => {
                debug!(resource = %resource, "Feed not found");
                Ok(None)
            }
            status => Err(Error::status(status, resource)),
        }
    }

    /// Creates a feed in this scope.
    ///
    /// # Errors
    ///
    /// - [`Error::Status`] if the service answers anything but 201
    /// - transport errors as for [`find`](Self::find)
    pub async fn create(&self, feed: &Feed) -> Result<()> {
        let request = Request::new("POST", &self.context).body(serde_json::to_value(feed)?);
        let response = self.client.execute(request).await?;

        match response.status {
            201 => Ok(()),
            status => Err(Error::status(status, self.context.clone())),
        }
    }

    /// Updates an existing feed, addressed by its name within this scope.
    ///
    /// # Errors
    ///
    /// - [`Error::Status`] if the service answers anything but 204
    /// - transport errors as for [`find`](Self::find)
    pub async fn update(&self, feed: &Feed) -> Result<()> {
        let resource = self.resource(&feed.name);
        let request = Request::new("PUT", &resource).body(serde_json::to_value(feed)?);
        let response = self.client.execute(request).await?;

        match response.status {
            204 => Ok(()),
            status => Err(Error::status(status, resource)),
        }
    }

    /// Deletes a feed by path.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the feed does not exist
    /// - [`Error::Status`] for any other non-success status
    /// - transport errors as for [`find`](Self::find)
    pub async fn delete(&self, path: &str) -> Result<()> {
        let resource = self.resource(path);
        let response = self
            .client
            .execute(Request::new("DELETE", &resource))
            .await?;

        match response.status {
            200 | 204 => Ok(()),
            404 => Err(Error::not_found(resource)),
            status => Err(Error::status(status, resource)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
