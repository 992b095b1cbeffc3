use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{GatewayError, Invoice, InvoiceRequest, PaymentGateway};

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    invoices: HashMap<String, InvoiceRequest>,
    expired: Vec<String>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_expire: bool,
    delay: Option<Duration>,
    response_delay: Option<Duration>,
}

impl InMemoryGatewayState {
    /// Stores the request. Same external id, same invoice.
    fn record(&mut self, request: InvoiceRequest) -> Invoice {
        if let Some((id, _)) = self
            .invoices
            .iter()
            .find(|(_, r)| r.external_id == request.external_id)
        {
            return invoice_for(id);
        }

        self.next_id += 1;
        let id = format!("INV-{:04}", self.next_id);
        let invoice = invoice_for(&id);
        self.invoices.insert(id, request);
        invoice
    }
}

fn invoice_for(id: &str) -> Invoice {
    Invoice {
        id: id.to_string(),
        invoice_url: format!("https://checkout.example.test/{id}"),
    }
}

/// In-memory payment gateway for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to decline invoice creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state().fail_on_create = fail;
    }

    /// Configures the gateway to fail when expiring invoices.
    pub fn set_fail_on_expire(&self, fail: bool) {
        self.state().fail_on_expire = fail;
    }

    /// Makes invoice creation wait before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Makes invoice creation succeed at once but answer late.
    pub fn set_response_delay(&self, delay: Option<Duration>) {
        self.state().response_delay = delay;
    }

    /// Returns the number of invoices created and not expired.
    pub fn active_invoice_count(&self) -> usize {
        let state = self.state();
        state.invoices.len() - state.expired.len()
    }

    /// Returns the number of invoices ever created.
    pub fn invoice_count(&self) -> usize {
        self.state().invoices.len()
    }

    /// Returns the number of expired invoices.
    pub fn expired_count(&self) -> usize {
        self.state().expired.len()
    }

    /// Returns the request an invoice was created from.
    pub fn request_for(&self, external_id: &str) -> Option<InvoiceRequest> {
        self.state()
            .invoices
            .values()
            .find(|r| r.external_id == external_id)
            .cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, GatewayError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (invoice, response_delay) = {
            let mut state = self.state();
            if state.fail_on_create {
                return Err(GatewayError::Declined("Invoice creation failed".to_string()));
            }
            (state.record(request), state.response_delay)
        };

        if let Some(delay) = response_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(invoice)
    }

    async fn find_invoice(&self, external_id: &str) -> Result<Option<Invoice>, GatewayError> {
        Ok(self
            .state()
            .invoices
            .iter()
            .find(|(_, r)| r.external_id == external_id)
            .map(|(id, _)| invoice_for(id)))
    }

    async fn expire_invoice(&self, invoice_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state();
        if state.fail_on_expire {
            return Err(GatewayError::Declined("Invoice expiry failed".to_string()));
        }
        if !state.invoices.contains_key(invoice_id) {
            return Err(GatewayError::Rejected {
                status: 404,
                body: format!("invoice {invoice_id} not found"),
            });
        }
        if !state.expired.iter().any(|id| id == invoice_id) {
            state.expired.push(invoice_id.to_string());
        }
        Ok(())
    }
}
