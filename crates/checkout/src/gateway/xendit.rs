use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GatewayError, Invoice, InvoiceRequest, PaymentGateway};

/// Xendit invoice API client.
#[derive(Debug, Clone)]
pub struct XenditGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Serialize)]
struct CreateInvoiceBody<'a> {
    external_id: &'a str,
    amount: i64,
    payer_email: &'a str,
    description: String,
    invoice_duration: u64,
    currency: &'a str,
    payment_methods: &'a [String],
    items: Vec<InvoiceItemBody<'a>>,
}

#[derive(Debug, Serialize)]
struct InvoiceItemBody<'a> {
    name: &'a str,
    quantity: i32,
    price: i64,
    category: &'a str,
    reference_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvoiceResponse {
    id: String,
    invoice_url: String,
}

impl<'a> CreateInvoiceBody<'a> {
    fn from_request(request: &'a InvoiceRequest) -> Self {
        Self {
            external_id: &request.external_id,
            amount: request.amount.amount(),
            payer_email: &request.payer_email,
            description: format!("Bookstore checkout {}", request.external_id),
            invoice_duration: request.invoice_duration_secs,
            currency: &request.currency,
            payment_methods: &request.payment_methods,
            items: request
                .items
                .iter()
                .map(|item| InvoiceItemBody {
                    name: &item.name,
                    quantity: item.quantity,
                    price: item.price.amount(),
                    category: &item.category,
                    reference_id: &item.reference_id,
                })
                .collect(),
        }
    }
}

impl XenditGateway {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.xendit.co";

    /// Creates a client. `timeout` bounds every request.
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PaymentGateway for XenditGateway {
    #[tracing::instrument(skip(self, request), fields(external_id = %request.external_id))]
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, GatewayError> {
        let body = CreateInvoiceBody::from_request(&request);

        let response = self
            .client
            .post(format!("{}/v2/invoices", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .header("X-IDEMPOTENCY-KEY", &request.external_id)
            .json(&body)
            .send()
            .await?;

        let invoice: InvoiceResponse = Self::ensure_success(response).await?.json().await?;
        tracing::info!(invoice_id = %invoice.id, "invoice created");

        Ok(Invoice {
            id: invoice.id,
            invoice_url: invoice.invoice_url,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn find_invoice(&self, external_id: &str) -> Result<Option<Invoice>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v2/invoices", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .query(&[("external_id", external_id)])
            .send()
            .await?;

        let invoices: Vec<InvoiceResponse> = Self::ensure_success(response).await?.json().await?;
        Ok(invoices.into_iter().next().map(|invoice| Invoice {
            id: invoice.id,
            invoice_url: invoice.invoice_url,
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn expire_invoice(&self, invoice_id: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(format!("{}/invoices/{invoice_id}/expire!", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }
}
