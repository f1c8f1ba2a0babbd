use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// 1. PaymentService Contract

/// CheckoutRequest
///
/// Everything needed to open a processor-hosted checkout session: the charge amount,
/// the redirect URLs, and the application metadata that must survive the round trip
/// to the processor as opaque session state (the system keeps no local record between
/// starting and confirming a checkout).
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    // Total charge in cents (application fees + service charge).
    pub amount_cents: i64,
    pub currency: String,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// CheckoutSession
///
/// The processor's view of a checkout session, as returned by both creation and
/// retrieval. `payment_intent` is the transaction identifier used as the idempotency
/// key; it is only present once the processor has attached a payment to the session.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_intent: Option<String>,
    pub payment_status: String,
    pub metadata: HashMap<String, String>,
}

/// PaymentService
///
/// Defines the abstract contract for all interactions with the payment processor.
/// This trait allows us to swap the concrete implementation—from the real HTTP client
/// (StripeCheckoutClient) in production to the in-memory Mock (MockPaymentService)
/// during testing—without affecting the calling handlers.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Opens a hosted checkout session and returns it (the `url` field carries the
    /// redirect target for the client).
    async fn create_checkout_session(
        &self,
        req: CheckoutRequest,
    ) -> Result<CheckoutSession, String>;

    /// Retrieves an existing session by id, including its payment status, payment
    /// intent and the metadata attached at creation time.
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, String>;
}

/// PaymentState
///
/// The concrete type used to share the payment service access across the application state.
pub type PaymentState = Arc<dyn PaymentService>;

// 2. The Real Implementation (Stripe Checkout)

/// StripeSessionPayload
///
/// Minimal deserialization target for the processor's session JSON. Only the fields
/// the lifecycle manager consumes are mapped.
#[derive(Deserialize)]
struct StripeSessionPayload {
    id: String,
    url: Option<String>,
    payment_intent: Option<String>,
    payment_status: Option<String>,
    metadata: Option<HashMap<String, String>>,
}

impl From<StripeSessionPayload> for CheckoutSession {
    fn from(p: StripeSessionPayload) -> Self {
        CheckoutSession {
            id: p.id,
            url: p.url,
            payment_intent: p.payment_intent,
            payment_status: p.payment_status.unwrap_or_else(|| "unpaid".to_string()),
            metadata: p.metadata.unwrap_or_default(),
        }
    }
}

/// StripeCheckoutClient
///
/// The concrete implementation speaking the Stripe Checkout Sessions HTTP API
/// (form-encoded requests, bearer secret key). The underlying reqwest client carries
/// an explicit request timeout: the processor is treated as an operation that may
/// hang, so no call is allowed to block a handler indefinitely.
#[derive(Clone)]
pub struct StripeCheckoutClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeCheckoutClient {
    /// new
    ///
    /// Constructs the client against the public Stripe API endpoint.
    pub fn new(secret_key: &str) -> Self {
        Self::with_base_url(secret_key, "https://api.stripe.com")
    }

    /// with_base_url
    ///
    /// Constructor taking an explicit endpoint, used to point the client at a local
    /// stripe-mock instance during development.
    pub fn with_base_url(secret_key: &str, base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("FATAL: failed to construct HTTP client for payments");

        Self {
            http,
            secret_key: secret_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentService for StripeCheckoutClient {
    /// create_checkout_session
    ///
    /// POST /v1/checkout/sessions with a single line item priced inline. Application
    /// metadata rides along as `metadata[...]` form fields and comes back verbatim on
    /// retrieval.
    async fn create_checkout_session(
        &self,
        req: CheckoutRequest,
    ) -> Result<CheckoutSession, String> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), req.success_url),
            ("cancel_url".to_string(), req.cancel_url),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                req.currency,
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                req.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                req.product_name,
            ),
        ];
        for (key, value) in req.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!(
                "checkout session creation rejected: HTTP {}",
                response.status()
            ));
        }

        let payload = response
            .json::<StripeSessionPayload>()
            .await
            .map_err(|e| e.to_string())?;
        Ok(payload.into())
    }

    /// retrieve_session
    ///
    /// GET /v1/checkout/sessions/{id}.
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, String> {
        let response = self
            .http
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.base_url, session_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!(
                "checkout session retrieval rejected: HTTP {}",
                response.status()
            ));
        }

        let payload = response
            .json::<StripeSessionPayload>()
            .await
            .map_err(|e| e.to_string())?;
        Ok(payload.into())
    }
}

// 3. The Mock Implementation (For Tests)

/// MockPaymentService
///
/// An in-memory implementation of `PaymentService` used exclusively for unit and
/// integration testing. Sessions created through it are held in a map and reported
/// back on retrieval with the configured payment status, which lets tests drive both
/// the paid and the abandoned checkout paths without network access.
pub struct MockPaymentService {
    /// Payment status every stored session reports on retrieval.
    payment_status: String,
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    sessions: Mutex<HashMap<String, CheckoutSession>>,
}

impl MockPaymentService {
    pub fn new() -> Self {
        Self::with_status("paid")
    }

    /// Sessions retrieved from this mock report an unfinished payment.
    pub fn new_unpaid() -> Self {
        Self::with_status("unpaid")
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::with_status("paid")
        }
    }

    fn with_status(status: &str) -> Self {
        Self {
            payment_status: status.to_string(),
            should_fail: false,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MockPaymentService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentService for MockPaymentService {
    async fn create_checkout_session(
        &self,
        req: CheckoutRequest,
    ) -> Result<CheckoutSession, String> {
        if self.should_fail {
            return Err("Mock Payment Error: simulation requested".to_string());
        }

        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let session = CheckoutSession {
            id: id.clone(),
            url: Some(format!("https://checkout.mock.local/pay/{}", id)),
            // One stable payment intent per session so repeated retrievals agree.
            payment_intent: Some(format!("pi_{}", Uuid::new_v4().simple())),
            payment_status: self.payment_status.clone(),
            metadata: req.metadata,
        };

        self.sessions
            .lock()
            .expect("mock session map poisoned")
            .insert(id, session.clone());

        Ok(session)
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, String> {
        if self.should_fail {
            return Err("Mock Payment Error: simulation requested".to_string());
        }

        self.sessions
            .lock()
            .expect("mock session map poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| format!("no such checkout session: {}", session_id))
    }
}
