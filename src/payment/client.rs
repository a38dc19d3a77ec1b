//! Payment-aware HTTP client.
//!
//! Issues the caller's request unmodified; on a 402 it parses the challenge,
//! enforces the auto-approve ceiling, signs, settles through the facilitator,
//! and replays the original request exactly once with settlement proof
//! attached. Nothing is retried automatically beyond that single replay: a
//! timeout or rejection at any stage is terminal for the attempt and the
//! caller decides what happens next.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Error;
use crate::keys::{KeyDeriver, PathRegistry, DEFAULT_DERIVATION_PATH};
use crate::money::Money;
use crate::payment::challenge::{PaymentRequirement, PAYMENT_REQUIRED_HEADER};
use crate::payment::facilitator::{FacilitatorClient, SettlementResult};
use crate::payment::payload::{
    PaymentPayload, PaymentSigner, BASE_CHAIN_ID, BASE_NETWORK, DEFAULT_DOMAIN_NAME,
    DEFAULT_DOMAIN_VERSION, USDC_ADDRESS,
};

/// Header the settlement proof rides in on the replayed request.
pub const PAYMENT_PROOF_HEADER: &str = "x-payment";

/// Default facilitator endpoint.
pub const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.agentpass.dev";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding an explicit payer private key (hex).
pub const PRIVATE_KEY_ENV: &str = "AGENTPASS_PRIVATE_KEY";

/// Configuration for a [`PaymentClient`].
#[derive(Debug, Clone)]
pub struct PaymentClientConfig {
    /// Facilitator base URL.
    pub facilitator_url: String,
    /// Largest challenge the client will pay without explicit approval.
    pub max_auto_approve: Money,
    /// Network identifier carried in payloads.
    pub network: String,
    /// Settlement token contract; also the EIP-712 verifying contract.
    pub token: Address,
    pub chain_id: u64,
    pub domain_name: String,
    pub domain_version: String,
    /// Timeout applied to every network call (challenge fetch, verify,
    /// settle, replay).
    pub timeout: Duration,
}

impl Default for PaymentClientConfig {
    fn default() -> Self {
        Self {
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            // Nothing is auto-approved until the caller raises the ceiling.
            max_auto_approve: Money::ZERO,
            network: BASE_NETWORK.to_string(),
            token: USDC_ADDRESS,
            chain_id: BASE_CHAIN_ID,
            domain_name: DEFAULT_DOMAIN_NAME.to_string(),
            domain_version: DEFAULT_DOMAIN_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PaymentClientConfig {
    /// Load configuration from `AGENTPASS_*` environment variables, with
    /// defaults for everything unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unparseable values.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Ok(url) = env::var("AGENTPASS_FACILITATOR_URL") {
            config.facilitator_url = url;
        }
        if let Ok(ceiling) = env::var("AGENTPASS_MAX_AUTO_APPROVE") {
            config.max_auto_approve = ceiling
                .parse()
                .map_err(|_| Error::Configuration("invalid AGENTPASS_MAX_AUTO_APPROVE".into()))?;
        }
        if let Ok(network) = env::var("AGENTPASS_NETWORK") {
            config.network = network;
        }
        if let Ok(token) = env::var("AGENTPASS_TOKEN_ADDRESS") {
            config.token = token
                .parse()
                .map_err(|_| Error::Configuration("invalid AGENTPASS_TOKEN_ADDRESS".into()))?;
        }
        if let Ok(chain_id) = env::var("AGENTPASS_CHAIN_ID") {
            config.chain_id = chain_id
                .parse()
                .map_err(|_| Error::Configuration("invalid AGENTPASS_CHAIN_ID".into()))?;
        }
        if let Ok(secs) = env::var("AGENTPASS_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::Configuration("invalid AGENTPASS_TIMEOUT_SECS".into()))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// The final response of a (possibly paid) request.
#[derive(Debug)]
pub struct PaidResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Present when the request went through the payment flow.
    pub settlement: Option<SettlementResult>,
}

impl PaidResponse {
    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    async fn from_response(
        response: Response,
        settlement: Option<SettlementResult>,
    ) -> Result<Self, Error> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .to_vec();
        Ok(Self {
            status,
            body,
            settlement,
        })
    }
}

/// HTTP client that transparently handles 402 payment challenges.
pub struct PaymentClient {
    http: Client,
    facilitator: FacilitatorClient,
    signer: PaymentSigner,
    max_auto_approve: Money,
    clock: Arc<dyn Clock>,
}

impl PaymentClient {
    /// Create a client from explicit configuration and a payer key.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(
        config: PaymentClientConfig,
        signer: PrivateKeySigner,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let facilitator = FacilitatorClient::new(&config.facilitator_url, config.timeout)?;
        let signer = PaymentSigner::new(
            signer,
            &config.network,
            config.token,
            config.chain_id,
            &config.domain_name,
            &config.domain_version,
        );

        info!(
            wallet = %signer.address(),
            facilitator = %facilitator.base_url(),
            "payment client ready"
        );

        Ok(Self {
            http,
            facilitator,
            signer,
            max_auto_approve: config.max_auto_approve,
            clock,
        })
    }

    /// Create a client from environment variables and the wall clock.
    ///
    /// The payer key comes from [`PRIVATE_KEY_ENV`] when set, otherwise it is
    /// derived from the principal authentication material at the default
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSignerAvailable`] when no key source exists, or a
    /// configuration error.
    pub fn from_env() -> Result<Self, Error> {
        let config = PaymentClientConfig::from_env()?;

        let signer = match env::var(PRIVATE_KEY_ENV) {
            Ok(raw) => {
                let stripped = raw.strip_prefix("0x").unwrap_or(&raw);
                let bytes = hex::decode(stripped)
                    .map_err(|e| Error::Key(format!("invalid {PRIVATE_KEY_ENV}: {e}")))?;
                if bytes.len() != 32 {
                    return Err(Error::Key(format!(
                        "{PRIVATE_KEY_ENV} must be 32 bytes, got {}",
                        bytes.len()
                    )));
                }
                PrivateKeySigner::from_bytes(&B256::from_slice(&bytes))
                    .map_err(|e| Error::Key(e.to_string()))?
            }
            Err(_) => {
                KeyDeriver::from_env(PathRegistry::new())?.derive(DEFAULT_DERIVATION_PATH)?
            }
        };

        Self::new(config, signer, Arc::new(SystemClock))
    }

    /// The paying wallet address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// GET a resource, paying for it if challenged.
    ///
    /// # Errors
    ///
    /// See [`PaymentClient::execute`].
    pub async fn get(&self, url: &str) -> Result<PaidResponse, Error> {
        self.execute(Method::GET, url, None).await
    }

    /// POST to a resource, paying for it if challenged.
    ///
    /// # Errors
    ///
    /// See [`PaymentClient::execute`].
    pub async fn post(&self, url: &str, body: &Value) -> Result<PaidResponse, Error> {
        self.execute(Method::POST, url, Some(body)).await
    }

    /// Run one request through the payment state machine.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedChallenge`] when a 402 carries no usable
    /// requirement; [`Error::ApprovalRequired`] when the price exceeds the
    /// ceiling (nothing is signed); [`Error::PaymentRejected`] when the
    /// facilitator declines at either phase (the request is not replayed);
    /// [`Error::UnexpectedSecondChallenge`] when the replay is challenged
    /// again; [`Error::Http`] on transport failures.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<PaidResponse, Error> {
        let initial = self.send(method.clone(), url, body, None).await?;

        if initial.status() != StatusCode::PAYMENT_REQUIRED {
            debug!(url, status = initial.status().as_u16(), "no payment required");
            return PaidResponse::from_response(initial, None).await;
        }

        let requirement = Self::parse_challenge(initial).await?;
        info!(
            url,
            route = %requirement.route,
            amount = %requirement.amount,
            "payment required"
        );

        if requirement.amount > self.max_auto_approve {
            warn!(
                amount = %requirement.amount,
                ceiling = %self.max_auto_approve,
                "challenge exceeds auto-approve ceiling"
            );
            return Err(Error::ApprovalRequired {
                amount: requirement.amount,
                ceiling: self.max_auto_approve,
            });
        }

        let payload = self.signer.sign_payment(&requirement, self.clock.as_ref())?;

        let outcome = self.facilitator.verify(&payload).await?;
        if !outcome.valid {
            return Err(Error::PaymentRejected(
                outcome
                    .error
                    .unwrap_or_else(|| "payment verification failed".to_string()),
            ));
        }

        let settlement = self.facilitator.settle(&payload).await?;
        if !settlement.success {
            return Err(Error::PaymentRejected(
                settlement
                    .error
                    .clone()
                    .unwrap_or_else(|| "settlement did not produce a transaction".to_string()),
            ));
        }
        info!(
            transaction = settlement.transaction_hash.as_deref().unwrap_or(""),
            nonce = payload.nonce,
            "payment settled, replaying request"
        );

        let proof = proof_header_value(&payload, &settlement)?;
        let replayed = self.send(method, url, body, Some(proof.as_str())).await?;

        // The replay is not payment-protected recursively.
        if replayed.status() == StatusCode::PAYMENT_REQUIRED {
            return Err(Error::UnexpectedSecondChallenge);
        }

        PaidResponse::from_response(replayed, Some(settlement)).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        proof: Option<&str>,
    ) -> Result<Response, Error> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(proof) = proof {
            request = request.header(PAYMENT_PROOF_HEADER, proof);
        }
        request.send().await.map_err(|e| Error::Http(e.to_string()))
    }

    /// Extract the payment requirement from a 402 response: header first,
    /// body as fallback.
    async fn parse_challenge(response: Response) -> Result<PaymentRequirement, Error> {
        let header = response
            .headers()
            .get(PAYMENT_REQUIRED_HEADER)
            .map(|v| v.to_str().map(str::to_string));

        match header {
            Some(Ok(raw)) => PaymentRequirement::from_header_value(&raw),
            Some(Err(_)) => Err(Error::MalformedChallenge(
                "challenge header is not valid ASCII".to_string(),
            )),
            None => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::Http(e.to_string()))?;
                if bytes.is_empty() {
                    return Err(Error::MalformedChallenge(
                        "402 response carried no payment requirement".to_string(),
                    ));
                }
                PaymentRequirement::from_body(&bytes)
            }
        }
    }
}

/// Settlement proof attached to the replayed request: the signed payload and
/// its transaction hash, base64-encoded JSON.
fn proof_header_value(
    payload: &PaymentPayload,
    settlement: &SettlementResult,
) -> Result<String, Error> {
    let proof = serde_json::json!({
        "payload": payload,
        "transactionHash": settlement.transaction_hash,
    });
    Ok(BASE64.encode(serde_json::to_string(&proof)?))
}
