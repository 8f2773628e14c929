//! Paid upload plans: checkout sessions and payment webhooks.

use std::sync::Arc;

use async_trait::async_trait;
use photowall_common::{AppError, AppResult, config::BillingConfig, verify_hmac_sha256_hex};
use photowall_db::{entities::event, repositories::EventRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use super::event::normalize_code;

/// Upload limit the webhook grants after a completed checkout.
///
/// Applied for every tier, so a purchased `premium` or `deluxe` plan ends up
/// with fewer uploads than its [`PlanTier::upload_limit`]. Kept as observed
/// until the intended behaviour is decided.
pub const WEBHOOK_UPLOAD_LIMIT: i32 = 200;

/// Purchasable upload plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Premium,
    Deluxe,
}

impl PlanTier {
    /// Upload quota of the tier.
    #[must_use]
    pub const fn upload_limit(self) -> i32 {
        match self {
            Self::Basic => 500,
            Self::Premium => 1000,
            Self::Deluxe => 5000,
        }
    }

    /// Price in cents.
    #[must_use]
    pub const fn price_cents(self) -> i64 {
        match self {
            Self::Basic => 1900,
            Self::Premium => 3900,
            Self::Deluxe => 9900,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Deluxe => "deluxe",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Basic => "Photowall Basic",
            Self::Premium => "Photowall Premium",
            Self::Deluxe => "Photowall Deluxe",
        }
    }
}

/// Checkout request sent to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub event_id: String,
    pub event_code: String,
    pub user_id: String,
    pub tier: PlanTier,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Trait for the payment processor's checkout API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest)
    -> AppResult<CheckoutSession>;
}

/// Gateway posting hosted checkout sessions to the Stripe API.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeGateway {
    /// Create a gateway from billing configuration.
    #[must_use]
    #[allow(clippy::expect_used)] // Client build only fails with incompatible TLS settings
    pub fn new(config: &BillingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", request.event_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.tier.price_cents().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                format!(
                    "{} ({} Uploads)",
                    request.tier.display_name(),
                    request.tier.upload_limit()
                ),
            ),
            ("metadata[event_id]", request.event_id.clone()),
            ("metadata[event_code]", request.event_code.clone()),
            ("metadata[user_id]", request.user_id.clone()),
            ("metadata[plan]", request.tier.as_str().to_string()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> AppResult<CheckoutSession> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Config("Payment secret key is not set".to_string()))?;

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(secret_key)
            .form(&Self::form(request))
            .send()
            .await
            .map_err(|e| AppError::Payment(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Checkout session rejected");
            return Err(AppError::Payment(format!(
                "Checkout session failed with status {status}"
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::Payment(format!("Invalid checkout response: {e}")))
    }
}

/// Shared payment gateway trait object.
pub type PaymentGatewayService = Arc<dyn PaymentGateway>;

/// Input for starting a checkout.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    #[validate(length(min = 1))]
    pub event_id: String,
    #[validate(length(min = 1))]
    pub event_code: String,
    pub plan: PlanTier,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A completed checkout raised the event's upload limit.
    Applied {
        event_id: String,
        previous_limit: i32,
        upload_limit: i32,
    },
    /// Event type without handling.
    Ignored { event_type: String },
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookObject {
    #[serde(default)]
    metadata: WebhookMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookMetadata {
    event_id: Option<String>,
    user_id: Option<String>,
}

/// Verify a `t=<unix>,v1=<hex>` signature header over `payload`.
pub fn verify_webhook_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::BadRequest("Invalid signature header".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::BadRequest("Invalid signature header".to_string()));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(AppError::BadRequest("Signature timestamp outside tolerance".to_string()));
    }

    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);

    if signatures
        .iter()
        .any(|sig| verify_hmac_sha256_hex(secret.as_bytes(), &signed, sig))
    {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid signature".to_string()))
    }
}

/// Billing service.
#[derive(Clone)]
pub struct BillingService {
    event_repo: EventRepository,
    gateway: PaymentGatewayService,
    config: BillingConfig,
    public_url: String,
}

impl BillingService {
    /// Create a new billing service.
    #[must_use]
    pub fn new(
        event_repo: EventRepository,
        gateway: PaymentGatewayService,
        config: BillingConfig,
        public_url: &str,
    ) -> Self {
        Self {
            event_repo,
            gateway,
            config,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start a hosted checkout for a plan upgrade.
    pub async fn create_checkout(
        &self,
        owner_id: &str,
        input: CheckoutInput,
    ) -> AppResult<CheckoutSession> {
        input.validate()?;

        let code = normalize_code(&input.event_code);
        let event = self
            .event_repo
            .find_by_id(&input.event_id)
            .await?
            .filter(|e| e.owner_id == owner_id && e.code == code)
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        if event.upload_limit >= input.plan.upload_limit() {
            return Err(AppError::BadRequest(format!(
                "Event already allows {} uploads",
                event.upload_limit
            )));
        }

        let dashboard = format!("{}/dashboard/events/{}", self.public_url, event.id);
        let request = CheckoutRequest {
            event_id: event.id.clone(),
            event_code: event.code.clone(),
            user_id: owner_id.to_string(),
            tier: input.plan,
            currency: self.config.currency.clone(),
            success_url: format!("{dashboard}?checkout=success"),
            cancel_url: format!("{dashboard}?checkout=cancelled"),
        };

        let session = self.gateway.create_checkout_session(&request).await?;
        info!(
            event_id = %event.id,
            plan = input.plan.as_str(),
            session_id = %session.id,
            "Checkout session created"
        );
        Ok(session)
    }

    /// Process a signed webhook delivery.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> AppResult<WebhookOutcome> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Config("Webhook secret is not set".to_string()))?;
        let signature =
            signature.ok_or_else(|| AppError::BadRequest("Missing signature".to_string()))?;
        verify_webhook_signature(
            signature,
            payload,
            secret,
            self.config.webhook_tolerance_secs,
            now,
        )?;

        let payload: WebhookPayload = serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

        if payload.event_type != "checkout.session.completed" {
            debug!(event_type = %payload.event_type, "Ignoring webhook");
            return Ok(WebhookOutcome::Ignored {
                event_type: payload.event_type,
            });
        }

        let metadata = payload.data.object.metadata;
        let (Some(event_id), Some(user_id)) = (metadata.event_id, metadata.user_id) else {
            return Err(AppError::BadRequest("Missing metadata".to_string()));
        };

        let event = self
            .event_repo
            .find_by_id(&event_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Paid event {event_id} does not exist")))?;
        let previous_limit = event.upload_limit;
        info!(
            event_id = %event.id,
            user_id = %user_id,
            previous_limit,
            "Applying completed checkout"
        );

        let mut active: event::ActiveModel = event.into();
        active.upload_limit = Set(WEBHOOK_UPLOAD_LIMIT);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        let updated = self.event_repo.update(active).await?;

        Ok(WebhookOutcome::Applied {
            event_id: updated.id,
            previous_limit,
            upload_limit: updated.upload_limit,
        })
    }
}
