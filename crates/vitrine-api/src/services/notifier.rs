//! Upstream notification
//!
//! After a batch is stored, the owning record on the main server is PATCHed with the
//! new URLs. Each entity type has its own endpoint and payload shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use vitrine_core::{AppError, Config, EntityType};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to build upstream client: {0}")]
    Client(String),

    #[error("Upstream request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream responded with status {status} for {url}")]
    Status { status: u16, url: String },
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        AppError::UpstreamNotify(err.to_string())
    }
}

/// Updates the upstream record of an entity with freshly stored URLs.
#[async_trait]
pub trait UpstreamNotifier: Send + Sync {
    async fn patch(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        urls: &[String],
        blur_hash: Option<&str>,
    ) -> Result<(), NotifyError>;
}

/// Image set of a variant entity. `video` is only sent for products.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantImages<'a> {
    pub image_high: &'a str,
    pub image_medium: &'a str,
    pub image_low: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<&'a str>,
    pub blur_hash: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PatchPayload<'a> {
    Images(VariantImages<'a>),
    Image { image: &'a str },
    Logo { logo: &'a str },
}

/// Path of the upstream record, relative to the main server URL.
///
/// Returns `None` for entity types that have no upstream record.
pub fn patch_path(entity_type: EntityType, entity_id: &str) -> Option<String> {
    let path = match entity_type {
        EntityType::Restaurant => format!("/restaurant/{entity_id}/logo"),
        EntityType::Branch => format!("/branch/{entity_id}/image"),
        EntityType::Menu => format!("/menu/{entity_id}/image"),
        EntityType::Category => format!("/category/{entity_id}/images"),
        EntityType::Product => format!("/product/{entity_id}/images"),
        EntityType::Banner => format!("/banner/{entity_id}/images"),
        EntityType::Branding | EntityType::Addon => return None,
    };
    Some(path)
}

/// Payload for the upstream record. Missing URLs are sent as empty strings.
pub fn patch_payload<'a>(
    entity_type: EntityType,
    urls: &'a [String],
    blur_hash: Option<&'a str>,
) -> Option<PatchPayload<'a>> {
    let url = |i: usize| urls.get(i).map(String::as_str).unwrap_or("");
    let blur_hash = blur_hash.unwrap_or("");

    let payload = match entity_type {
        EntityType::Product => PatchPayload::Images(VariantImages {
            image_high: url(0),
            image_medium: url(1),
            image_low: url(2),
            video: Some(url(3)),
            blur_hash,
        }),
        EntityType::Category | EntityType::Banner => PatchPayload::Images(VariantImages {
            image_high: url(0),
            image_medium: url(1),
            image_low: url(2),
            video: None,
            blur_hash,
        }),
        EntityType::Branch | EntityType::Menu => PatchPayload::Image { image: url(0) },
        EntityType::Restaurant => PatchPayload::Logo { logo: url(0) },
        EntityType::Branding | EntityType::Addon => return None,
    };
    Some(payload)
}

/// [`UpstreamNotifier`] backed by `reqwest`, authenticating with a bearer token.
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpNotifier {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, NotifyError> {
        Self::new(
            config.main_server_url(),
            config.main_server_token(),
            config.notify_timeout(),
        )
    }
}

#[async_trait]
impl UpstreamNotifier for HttpNotifier {
    #[tracing::instrument(skip(self, urls, blur_hash), fields(url_count = urls.len()))]
    async fn patch(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        urls: &[String],
        blur_hash: Option<&str>,
    ) -> Result<(), NotifyError> {
        let (Some(path), Some(payload)) = (
            patch_path(entity_type, entity_id),
            patch_payload(entity_type, urls, blur_hash),
        ) else {
            tracing::info!(
                entity_type = %entity_type,
                "Entity type has no upstream record, skipping notification"
            );
            return Ok(());
        };

        let url = format!("{}{}", self.base_url, path);
        let start = std::time::Instant::now();

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|source| NotifyError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                url = %url,
                status = status.as_u16(),
                "Upstream record update rejected"
            );
            return Err(NotifyError::Status {
                status: status.as_u16(),
                url,
            });
        }

        tracing::info!(
            entity_type = %entity_type,
            entity_id = %entity_id,
            duration_ms = start.elapsed().as_millis(),
            "Upstream record updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn notifier(server: &mockito::ServerGuard) -> HttpNotifier {
        HttpNotifier::new(server.url(), "secret-token", Duration::from_secs(5))
            .expect("build notifier")
    }

    #[test]
    fn test_patch_paths() {
        let cases = [
            (EntityType::Restaurant, "/restaurant/7/logo"),
            (EntityType::Branch, "/branch/7/image"),
            (EntityType::Menu, "/menu/7/image"),
            (EntityType::Category, "/category/7/images"),
            (EntityType::Product, "/product/7/images"),
            (EntityType::Banner, "/banner/7/images"),
        ];
        for (entity_type, expected) in cases {
            assert_eq!(patch_path(entity_type, "7").as_deref(), Some(expected));
        }
        assert!(patch_path(EntityType::Branding, "7").is_none());
        assert!(patch_path(EntityType::Addon, "7").is_none());
    }

    #[test]
    fn test_product_payload_fills_missing_with_empty() {
        let urls = urls(&["h", "m", "l"]);
        let payload = patch_payload(EntityType::Product, &urls, Some("LKO2?U%2Tw=w]~RBVZRi};RPxuwH"))
            .expect("product payload");
        assert_eq!(
            serde_json::to_value(&payload).expect("serialize"),
            json!({
                "imageHigh": "h",
                "imageMedium": "m",
                "imageLow": "l",
                "video": "",
                "blurHash": "LKO2?U%2Tw=w]~RBVZRi};RPxuwH",
            })
        );
    }

    #[test]
    fn test_category_payload_has_no_video() {
        let urls = urls(&["h", "m", "l", "extra"]);
        let payload = patch_payload(EntityType::Category, &urls, None).expect("payload");
        assert_eq!(
            serde_json::to_value(&payload).expect("serialize"),
            json!({
                "imageHigh": "h",
                "imageMedium": "m",
                "imageLow": "l",
                "blurHash": "",
            })
        );
    }

    #[test]
    fn test_single_image_payloads() {
        let urls = urls(&["https://cdn.test/BPfs/front.png"]);
        let branch = patch_payload(EntityType::Menu, &urls, None).expect("payload");
        assert_eq!(
            serde_json::to_value(&branch).expect("serialize"),
            json!({ "image": "https://cdn.test/BPfs/front.png" })
        );

        let restaurant = patch_payload(EntityType::Restaurant, &[], None).expect("payload");
        assert_eq!(
            serde_json::to_value(&restaurant).expect("serialize"),
            json!({ "logo": "" })
        );
    }

    #[tokio::test]
    async fn test_patch_sends_bearer_and_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/product/42/images")
            .match_header("authorization", "Bearer secret-token")
            .match_body(Matcher::Json(json!({
                "imageHigh": "h",
                "imageMedium": "m",
                "imageLow": "l",
                "video": "v",
                "blurHash": "hash",
            })))
            .with_status(200)
            .create_async()
            .await;

        let urls = urls(&["h", "m", "l", "v"]);
        notifier(&server)
            .patch(EntityType::Product, "42", &urls, Some("hash"))
            .await
            .expect("patch succeeds");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PATCH", "/branch/9/image")
            .with_status(500)
            .create_async()
            .await;

        let urls = urls(&["u"]);
        let err = notifier(&server)
            .patch(EntityType::Branch, "9", &urls, None)
            .await
            .expect_err("500 must fail");

        match err {
            NotifyError::Status { status, url } => {
                assert_eq!(status, 500);
                assert!(url.ends_with("/branch/9/image"));
            }
            other => panic!("Expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_branding_is_not_notified() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        notifier(&server)
            .patch(EntityType::Branding, "1", &urls(&["u"]), None)
            .await
            .expect("skipped");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_request_error() {
        let notifier = HttpNotifier::new("http://127.0.0.1:1", "t", Duration::from_secs(2))
            .expect("build notifier");
        let err = notifier
            .patch(EntityType::Menu, "1", &[], None)
            .await
            .expect_err("connection refused");
        assert!(matches!(err, NotifyError::Request { .. }));
    }
}
