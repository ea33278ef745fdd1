//! Reqwest middleware that pays for `402 Payment Required` responses.
//!
//! A [`PaymentClient`] wraps a `reqwest` client as middleware. Requests that
//! are not challenged pass through untouched. A challenged request is paid
//! once, through the registered [`SchemeClient`](agentmart_pay::scheme::SchemeClient)s
//! and the configured [`PaymentSelector`](agentmart_pay::scheme::PaymentSelector),
//! and retried exactly once with the payment attached.
//!
//! ```ignore
//! use agentmart_http::client::{PaymentClient, ReqwestWithPayments, ReqwestWithPaymentsBuild};
//!
//! let client = reqwest::Client::new()
//!     .with_payments(PaymentClient::new().register(solana_exact_client))
//!     .build();
//! let response = client.post(url).send().await?;
//! ```

mod middleware;

pub use middleware::*;

use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

/// Adds payment handling to reqwest clients and builders.
pub trait ReqwestWithPayments<A, S> {
    /// Attaches the payment middleware.
    fn with_payments(self, payment_client: PaymentClient<S>) -> ReqwestWithPaymentsBuilder<A, S>;
}

impl<S> ReqwestWithPayments<Self, S> for Client {
    fn with_payments(
        self,
        payment_client: PaymentClient<S>,
    ) -> ReqwestWithPaymentsBuilder<Self, S> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            payment_client,
        }
    }
}

impl<S> ReqwestWithPayments<Self, S> for ClientBuilder {
    fn with_payments(
        self,
        payment_client: PaymentClient<S>,
    ) -> ReqwestWithPaymentsBuilder<Self, S> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            payment_client,
        }
    }
}

/// Builder for a reqwest client with payment middleware.
#[allow(missing_debug_implementations)] // generic A may not implement Debug
pub struct ReqwestWithPaymentsBuilder<A, S> {
    inner: A,
    payment_client: PaymentClient<S>,
}

/// Builds the final client from a [`ReqwestWithPaymentsBuilder`].
pub trait ReqwestWithPaymentsBuild {
    /// The type returned by [`build`](Self::build).
    type BuildResult;
    /// The type returned by [`builder`](Self::builder).
    type BuilderResult;

    /// Builds the client, consuming the builder.
    fn build(self) -> Self::BuildResult;

    /// Returns the middleware client builder with payments attached.
    fn builder(self) -> Self::BuilderResult;
}

impl<S> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client, S>
where
    PaymentClient<S>: rqm::Middleware,
{
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.payment_client)
    }
}

impl<S> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder, S>
where
    PaymentClient<S>: rqm::Middleware,
{
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        Ok(self.builder()?.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.payment_client))
    }
}
