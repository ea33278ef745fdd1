//! The paying middleware and its challenge state machine.

use std::sync::Arc;

use agentmart_pay::proto;
use agentmart_pay::scheme::{
    ClientError, FirstMatch, PaymentCandidate, PaymentSelector, SchemeClient,
};
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, trace};

use crate::constants::{
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, X_PAYMENT_RESPONSE_HEADER,
    payment_header_name,
};
use crate::error::HttpError;
use crate::headers::{decode_payment_required, decode_payment_response};

/// Where a single call stands in the challenge protocol.
///
/// `Unchallenged -(402)-> Challenged -(2xx)-> Settled`. A call leaves
/// `Challenged` at most once: the retried response either settles it or
/// fails it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentState {
    /// No 402 seen yet.
    #[default]
    Unchallenged,
    /// Paid once and waiting for the retried response.
    Challenged,
    /// The paid retry succeeded.
    Settled,
}

/// What the middleware does with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Hand the response to the caller as is.
    Return,
    /// Sign a payment and resend.
    Pay,
    /// Surface an error carrying this status.
    Fail(StatusCode),
}

impl PaymentState {
    /// Advances the state for a response with `status`.
    pub fn on_response(&mut self, status: StatusCode) -> Step {
        match *self {
            Self::Unchallenged if status == StatusCode::PAYMENT_REQUIRED => {
                *self = Self::Challenged;
                Step::Pay
            }
            Self::Challenged if status.is_success() => {
                *self = Self::Settled;
                Step::Return
            }
            Self::Challenged => Step::Fail(status),
            Self::Unchallenged | Self::Settled => Step::Return,
        }
    }
}

/// Orchestrates scheme clients and selection for one HTTP client.
///
/// Registered scheme clients are consulted in order; their candidates are
/// handed to the selector, and only the selected candidate is signed.
#[allow(missing_debug_implementations)] // ClientSchemes contains dyn trait objects
pub struct PaymentClient<TSelector> {
    schemes: ClientSchemes,
    selector: TSelector,
}

impl PaymentClient<FirstMatch> {
    /// Creates a client with [`FirstMatch`] selection and no schemes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for PaymentClient<FirstMatch> {
    fn default() -> Self {
        Self {
            schemes: ClientSchemes::default(),
            selector: FirstMatch,
        }
    }
}

impl<TSelector> PaymentClient<TSelector> {
    /// Registers a scheme client.
    #[must_use]
    pub fn register<S>(mut self, scheme: S) -> Self
    where
        S: SchemeClient + 'static,
    {
        self.schemes.push(scheme);
        self
    }

    /// Replaces the payment selector.
    pub fn with_selector<P: PaymentSelector + 'static>(self, selector: P) -> PaymentClient<P> {
        PaymentClient {
            schemes: self.schemes,
            selector,
        }
    }

    /// Returns `true` if no scheme client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemes.0.is_empty()
    }
}

impl<TSelector> PaymentClient<TSelector>
where
    TSelector: PaymentSelector,
{
    /// Turns a 402 response into the headers of the paid retry.
    ///
    /// Signs exactly one candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ParseError`] if the challenge cannot be parsed,
    /// [`ClientError::NoMatchingPaymentOption`] if no registered scheme (or
    /// the selector) accepts any option, and the signer's error otherwise.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "agentmart.payment.make_headers", skip_all, err)
    )]
    pub async fn make_payment_headers(&self, res: Response) -> Result<HeaderMap, ClientError> {
        let payment_required = parse_payment_required(res).await?;
        let candidates = self.schemes.candidates(&payment_required);
        let selected = self
            .selector
            .select(&candidates)
            .ok_or(ClientError::NoMatchingPaymentOption)?;

        #[cfg(feature = "telemetry")]
        debug!(
            scheme = %selected.scheme,
            chain_id = %selected.chain_id,
            amount = %selected.amount,
            pay_to = %selected.pay_to,
            "Selected payment option"
        );

        let signed_payload = selected.sign().await?;
        let value = HeaderValue::from_str(&signed_payload)
            .map_err(|e| ClientError::SigningError(format!("payload is not a header value: {e}")))?;
        let name = HeaderName::from_bytes(payment_header_name(selected.x402_version).as_bytes())
            .map_err(|e| ClientError::SigningError(e.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        Ok(headers)
    }
}

/// Registered scheme clients, in registration order.
#[derive(Default)]
#[allow(missing_debug_implementations)] // dyn trait objects do not implement Debug
pub struct ClientSchemes(Vec<Arc<dyn SchemeClient>>);

impl ClientSchemes {
    /// Adds a scheme client.
    pub fn push<T: SchemeClient + 'static>(&mut self, client: T) {
        self.0.push(Arc::new(client));
    }

    /// Collects the candidates of every registered client.
    #[must_use]
    pub fn candidates(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
        self.0
            .iter()
            .flat_map(|client| client.accept(payment_required))
            .collect()
    }
}

#[cfg_attr(
    feature = "telemetry",
    instrument(name = "agentmart.payment.next", skip_all)
)]
async fn run_next(
    next: rqm::Next<'_>,
    req: Request,
    extensions: &mut Extensions,
) -> rqm::Result<Response> {
    next.run(req, extensions).await
}

#[async_trait::async_trait]
impl<TSelector> rqm::Middleware for PaymentClient<TSelector>
where
    TSelector: PaymentSelector + Send + Sync + 'static,
{
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "agentmart.payment.handle", skip_all, err)
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let mut state = PaymentState::Unchallenged;
        let retry_req = req.try_clone();
        let res = run_next(next.clone(), req, extensions).await?;

        if state.on_response(res.status()) != Step::Pay {
            #[cfg(feature = "telemetry")]
            trace!(status = ?res.status(), "No payment required, returning response");
            return Ok(res);
        }

        #[cfg(feature = "telemetry")]
        info!(url = %res.url(), "Received 402 Payment Required, paying once");

        let mut retry = retry_req
            .ok_or_else(|| rqm::Error::Middleware(ClientError::RequestNotCloneable.into()))?;
        let headers = self
            .make_payment_headers(res)
            .await
            .map_err(|e| rqm::Error::Middleware(e.into()))?;
        retry.headers_mut().extend(headers);

        let res = run_next(next, retry, extensions).await?;
        let status = res.status();
        match state.on_response(status) {
            Step::Return => {
                #[cfg(feature = "telemetry")]
                debug!(status = ?status, "Paid request settled");
                Ok(res)
            }
            Step::Pay | Step::Fail(_) => {
                let reason = settlement_receipt(res.headers())
                    .and_then(Result::ok)
                    .and_then(|receipt| receipt.error_reason);
                Err(rqm::Error::Middleware(
                    HttpError::RetryFailed {
                        status: status.as_u16(),
                        reason,
                    }
                    .into(),
                ))
            }
        }
    }
}

/// Parses a 402 response into a [`proto::PaymentRequired`].
///
/// The base64 `PAYMENT-REQUIRED` header wins; a JSON body is the fallback.
///
/// # Errors
///
/// Returns [`ClientError::ParseError`] if neither form parses.
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "agentmart.payment.parse_challenge", skip(response), err)
)]
pub async fn parse_payment_required(
    response: Response,
) -> Result<proto::PaymentRequired, ClientError> {
    if let Some(header) = response.headers().get(PAYMENT_REQUIRED_HEADER) {
        let value = header
            .to_str()
            .map_err(|e| ClientError::ParseError(format!("{PAYMENT_REQUIRED_HEADER}: {e}")))?;
        #[cfg(feature = "telemetry")]
        debug!("Parsing challenge from header");
        return decode_payment_required(value)
            .map_err(|e| ClientError::ParseError(format!("{PAYMENT_REQUIRED_HEADER}: {e}")));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| ClientError::ParseError(format!("402 body: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| ClientError::ParseError(format!("402 body: {e}")))
}

/// Decodes the settlement receipt of a paid response, if the server sent one.
#[must_use]
pub fn settlement_receipt(headers: &HeaderMap) -> Option<Result<proto::SettleResponse, HttpError>> {
    let header = headers
        .get(PAYMENT_RESPONSE_HEADER)
        .or_else(|| headers.get(X_PAYMENT_RESPONSE_HEADER))?;
    Some(
        header
            .to_str()
            .map_err(|_| HttpError::InvalidHeader(PAYMENT_RESPONSE_HEADER))
            .and_then(decode_payment_response),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ReqwestWithPayments, ReqwestWithPaymentsBuild};
    use crate::constants::{PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER};
    use crate::headers::{encode_payment_required, encode_payment_response};
    use agentmart_pay::chain::ChainId;
    use agentmart_pay::proto::{PaymentRequired, PaymentRequirements, SettleResponse};
    use agentmart_pay::scheme::{MaxAmount, PaymentCandidateSigner, SchemeId};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Clone)]
    struct CountingScheme {
        signs: Arc<AtomicUsize>,
        reject: bool,
    }

    struct CountingSigner {
        signs: Arc<AtomicUsize>,
        reject: bool,
    }

    impl PaymentCandidateSigner for CountingSigner {
        fn sign_payment(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<String, ClientError>> + Send + '_>> {
            Box::pin(async move {
                let n = self.signs.fetch_add(1, Ordering::SeqCst);
                if self.reject {
                    Err(ClientError::SigningRejected("user declined".to_owned()))
                } else {
                    Ok(format!("signed-{n}"))
                }
            })
        }
    }

    impl SchemeId for CountingScheme {
        fn namespace(&self) -> &str {
            "solana"
        }
        fn scheme(&self) -> &str {
            "exact"
        }
    }

    impl SchemeClient for CountingScheme {
        fn accept(&self, payment_required: &PaymentRequired) -> Vec<PaymentCandidate> {
            payment_required
                .accepts
                .iter()
                .filter(|r| r.scheme == "exact")
                .map(|r| PaymentCandidate {
                    chain_id: ChainId::new("solana", "devnet"),
                    asset: r.asset.clone(),
                    amount: r.amount_units().unwrap_or_default(),
                    scheme: r.scheme.clone(),
                    x402_version: payment_required.x402_version,
                    pay_to: r.pay_to.clone(),
                    signer: Box::new(CountingSigner {
                        signs: Arc::clone(&self.signs),
                        reject: self.reject,
                    }),
                })
                .collect()
        }
    }

    fn scheme(reject: bool) -> (CountingScheme, Arc<AtomicUsize>) {
        let signs = Arc::new(AtomicUsize::new(0));
        (
            CountingScheme {
                signs: Arc::clone(&signs),
                reject,
            },
            signs,
        )
    }

    fn challenge(version: u32, scheme: &str, amount: &str) -> PaymentRequired {
        PaymentRequired {
            x402_version: version,
            error: None,
            resource: None,
            accepts: vec![PaymentRequirements {
                scheme: scheme.to_owned(),
                network: "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1".to_owned(),
                asset: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".to_owned(),
                amount: amount.to_owned(),
                pay_to: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_owned(),
                max_timeout_seconds: 60,
                extra: serde_json::json!({}),
            }],
            extensions: None,
        }
    }

    fn challenge_response(challenge: &PaymentRequired) -> ResponseTemplate {
        ResponseTemplate::new(402).insert_header(
            PAYMENT_REQUIRED_HEADER,
            encode_payment_required(challenge).unwrap().as_str(),
        )
    }

    async fn mount_paywall(server: &MockServer, challenge: &PaymentRequired, paid_header: &str) {
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .and(header_exists(paid_header))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .with_priority(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(challenge_response(challenge))
            .mount(server)
            .await;
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map_or(0, |r| r.len())
    }

    fn retry_status(err: &rqm::Error) -> Option<u16> {
        if let rqm::Error::Middleware(e) = err
            && let Some(HttpError::RetryFailed { status, .. }) = e.downcast_ref::<HttpError>()
        {
            return Some(*status);
        }
        None
    }

    #[test]
    fn test_state_machine_unchallenged_passthrough() {
        let mut state = PaymentState::default();
        assert_eq!(state.on_response(StatusCode::OK), Step::Return);
        assert_eq!(state.on_response(StatusCode::NOT_FOUND), Step::Return);
        assert_eq!(state, PaymentState::Unchallenged);
    }

    #[test]
    fn test_state_machine_single_transition_out_of_challenged() {
        let mut state = PaymentState::default();
        assert_eq!(state.on_response(StatusCode::PAYMENT_REQUIRED), Step::Pay);
        assert_eq!(state, PaymentState::Challenged);
        assert_eq!(
            state.on_response(StatusCode::PAYMENT_REQUIRED),
            Step::Fail(StatusCode::PAYMENT_REQUIRED)
        );
        assert_eq!(state, PaymentState::Challenged);

        let mut state = PaymentState::Challenged;
        assert_eq!(state.on_response(StatusCode::CREATED), Step::Return);
        assert_eq!(state, PaymentState::Settled);
    }

    #[tokio::test]
    async fn test_unchallenged_request_is_not_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("free"))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let res = client
            .post(format!("{}/rpc", server.uri()))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "free");
        assert_eq!(signs.load(Ordering::SeqCst), 0);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_non_402_error_is_returned_unmodified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let res = client.post(server.uri()).send().await.unwrap();

        assert_eq!(res.status(), 500);
        assert_eq!(signs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_challenge_is_paid_once_and_retried_once() {
        let server = MockServer::start().await;
        mount_paywall(&server, &challenge(2, "exact", "10000"), PAYMENT_SIGNATURE_HEADER).await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let res = client
            .post(format!("{}/rpc", server.uri()))
            .body("{}")
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        assert_eq!(signs.load(Ordering::SeqCst), 1);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].headers.get(PAYMENT_SIGNATURE_HEADER).unwrap(),
            "signed-0"
        );
        assert_eq!(requests[1].body, b"{}");
    }

    #[tokio::test]
    async fn test_each_call_signs_its_own_payment() {
        let server = MockServer::start().await;
        mount_paywall(&server, &challenge(2, "exact", "10000"), PAYMENT_SIGNATURE_HEADER).await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        for _ in 0..2 {
            let res = client
                .post(format!("{}/rpc", server.uri()))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), 200);
        }

        assert_eq!(signs.load(Ordering::SeqCst), 2);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 4);
        let paid: Vec<_> = requests
            .iter()
            .filter_map(|r| r.headers.get(PAYMENT_SIGNATURE_HEADER))
            .collect();
        assert_eq!(paid, ["signed-0", "signed-1"]);
        assert!(requests[0].headers.get(PAYMENT_SIGNATURE_HEADER).is_none());
        assert!(requests[2].headers.get(PAYMENT_SIGNATURE_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_challenge_body_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge(2, "exact", "5")))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let res = client.post(server.uri()).send().await.unwrap();

        assert_eq!(res.status(), 200);
        assert_eq!(signs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_version_one_challenge_uses_x_payment() {
        let server = MockServer::start().await;
        mount_paywall(&server, &challenge(1, "exact", "10000"), X_PAYMENT_HEADER).await;
        let (scheme, _signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let res = client
            .post(format!("{}/rpc", server.uri()))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn test_second_402_is_an_error_not_the_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(challenge_response(&challenge(2, "exact", "10000")))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let err = client.post(server.uri()).send().await.unwrap_err();

        assert_eq!(retry_status(&err), Some(402));
        assert_eq!(signs.load(Ordering::SeqCst), 1);
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_failed_retry_carries_settlement_reason() {
        let server = MockServer::start().await;
        let receipt = SettleResponse {
            success: false,
            error_reason: Some("insufficient_funds".to_owned()),
            payer: None,
            transaction: String::new(),
            network: String::new(),
        };
        Mock::given(method("POST"))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(500).insert_header(
                PAYMENT_RESPONSE_HEADER,
                encode_payment_response(&receipt).unwrap().as_str(),
            ))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(challenge_response(&challenge(2, "exact", "1")))
            .mount(&server)
            .await;
        let (scheme, _signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let err = client.post(server.uri()).send().await.unwrap_err();

        let rqm::Error::Middleware(err) = err else {
            panic!("expected a middleware error");
        };
        match err.downcast_ref::<HttpError>() {
            Some(HttpError::RetryFailed { status, reason }) => {
                assert_eq!(*status, 500);
                assert_eq!(reason.as_deref(), Some("insufficient_funds"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_challenge_emits_no_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_string("pay me"))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let err = client.post(server.uri()).send().await.unwrap_err();

        assert!(err.to_string().contains("parse"));
        assert_eq!(signs.load(Ordering::SeqCst), 0);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_no_matching_scheme_emits_no_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(challenge_response(&challenge(2, "upto", "10")))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let err = client.post(server.uri()).send().await.unwrap_err();

        assert!(err.to_string().contains("no matching payment option"));
        assert_eq!(signs.load(Ordering::SeqCst), 0);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_rejected_signing_emits_no_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(challenge_response(&challenge(2, "exact", "10")))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(true);
        let client = reqwest::Client::new()
            .with_payments(PaymentClient::new().register(scheme))
            .build();

        let err = client.post(server.uri()).send().await.unwrap_err();

        assert!(err.to_string().contains("rejected"));
        assert_eq!(signs.load(Ordering::SeqCst), 1);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_spending_cap_refuses_expensive_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(challenge_response(&challenge(2, "exact", "1000001")))
            .mount(&server)
            .await;
        let (scheme, signs) = scheme(false);
        let client = reqwest::Client::new()
            .with_payments(
                PaymentClient::new()
                    .register(scheme)
                    .with_selector(MaxAmount(1_000_000)),
            )
            .build();

        let err = client.post(server.uri()).send().await.unwrap_err();

        assert!(err.to_string().contains("no matching payment option"));
        assert_eq!(signs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_settlement_receipt_absent() {
        assert!(settlement_receipt(&HeaderMap::new()).is_none());
    }
}
