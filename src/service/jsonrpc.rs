//! JSON-RPC client for the coupon service.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    config::RemoteConfig,
    ids::{CouponId, ProgramId},
    service::{
        CouponService, CouponState, GeneratedCoupons, ScanOutcome, ScanRequest, ServiceError,
        ValidateRequest,
    },
};

/// [`CouponService`] speaking JSON-RPC `call_kw` to the backend.
#[derive(Debug)]
pub struct JsonRpcCouponService {
    base_url: String,
    session_cookie: Option<String>,
    http: Client,
    next_id: AtomicU64,
}

impl JsonRpcCouponService {
    /// Create a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            session_cookie: config.session_cookie.clone(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call_kw(&self, model: &str, method: &str, args: Value) -> Result<Value, ServiceError> {
        let url = format!("{}/web/dataset/call_kw/{model}/{method}", self.base_url);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = call_body(model, method, args, id);

        let mut request = self.http.post(&url).json(&body);

        if let Some(cookie) = &self.session_cookie {
            request = request.header(header::COOKIE, format!("session_id={cookie}"));
        }

        debug!(%url, id, "calling coupon service");

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(ServiceError::UnexpectedResponse(format!(
                "{model}.{method} failed with status {status}: {text}"
            )));
        }

        decode_result(response.json().await?)
    }
}

#[async_trait]
impl CouponService for JsonRpcCouponService {
    #[tracing::instrument(name = "coupon_service.program_usage_count", skip(self), err)]
    async fn program_usage_count(&self, program: ProgramId) -> Result<u32, ServiceError> {
        let result = self
            .call_kw("coupon.program", "get_number_usage", json!([program]))
            .await?;

        decode_usage(&result)
    }

    #[tracing::instrument(
        name = "coupon_service.scan_code",
        skip(self, request),
        fields(session = %request.session, excluded = request.excluded_programs.len()),
        err
    )]
    async fn scan_code(&self, request: ScanRequest) -> Result<ScanOutcome, ServiceError> {
        let result = self
            .call_kw("pos.session", "scan_code", scan_args(&request))
            .await?;

        decode_scan(result)
    }

    #[tracing::instrument(name = "coupon_service.set_coupon_state", skip(self), err)]
    async fn set_coupon_state(
        &self,
        coupons: Vec<CouponId>,
        state: CouponState,
    ) -> Result<(), ServiceError> {
        self.call_kw("coupon.coupon", "set_state", json!([coupons, state]))
            .await?;

        Ok(())
    }

    #[tracing::instrument(name = "coupon_service.validate_coupon_programs", skip(self), err)]
    async fn validate_coupon_programs(
        &self,
        request: ValidateRequest,
    ) -> Result<GeneratedCoupons, ServiceError> {
        let result = self
            .call_kw(
                "pos.order",
                "validate_coupon_programs",
                json!([
                    request.orders,
                    request.programs_to_generate,
                    request.unused_coupons
                ]),
            )
            .await?;

        Ok(GeneratedCoupons(result))
    }
}

fn call_body(model: &str, method: &str, args: Value, id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "call",
        "id": id,
        "params": {
            "model": model,
            "method": method,
            "args": args,
            "kwargs": {},
        },
    })
}

fn scan_args(request: &ScanRequest) -> Value {
    let customer = request
        .customer
        .map_or(Value::Bool(false), |customer| json!(customer));

    json!([
        [request.session],
        request.code,
        customer,
        request.excluded_programs
    ])
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorData {
    message: Option<String>,
}

fn decode_result(body: Value) -> Result<Value, ServiceError> {
    let envelope: RpcEnvelope = serde_json::from_value(body)
        .map_err(|error| ServiceError::UnexpectedResponse(error.to_string()))?;

    if let Some(error) = envelope.error {
        let message = error
            .data
            .and_then(|data| data.message)
            .unwrap_or(error.message);

        return Err(ServiceError::Rpc {
            code: error.code,
            message,
        });
    }

    Ok(envelope.result.unwrap_or(Value::Null))
}

fn decode_usage(result: &Value) -> Result<u32, ServiceError> {
    result
        .as_u64()
        .and_then(|count| u32::try_from(count).ok())
        .ok_or_else(|| ServiceError::UnexpectedResponse(format!("invalid usage count: {result}")))
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    successful: bool,
    payload: ScanPayload,
}

#[derive(Debug, Deserialize)]
struct ScanPayload {
    program_id: Option<ProgramId>,
    coupon_id: Option<CouponId>,
    error_message: Option<String>,
}

fn decode_scan(result: Value) -> Result<ScanOutcome, ServiceError> {
    let response: ScanResponse = serde_json::from_value(result)
        .map_err(|error| ServiceError::UnexpectedResponse(error.to_string()))?;

    let payload = response.payload;

    if !response.successful {
        return Ok(ScanOutcome::Rejected {
            message: payload.error_message.unwrap_or_default(),
        });
    }

    match (payload.program_id, payload.coupon_id) {
        (Some(program), Some(coupon)) => Ok(ScanOutcome::Accepted { program, coupon }),
        _ => Err(ServiceError::UnexpectedResponse(
            "successful scan without program or coupon".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::ids::{PartnerId, SessionId};

    use super::*;

    #[test]
    fn call_body_wraps_params() {
        let body = call_body("coupon.program", "get_number_usage", json!([4]), 9);

        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 9);
        assert_eq!(body["params"]["model"], "coupon.program");
        assert_eq!(body["params"]["method"], "get_number_usage");
        assert_eq!(body["params"]["args"], json!([4]));
    }

    #[test]
    fn scan_args_send_false_without_customer() {
        let mut request = ScanRequest {
            session: SessionId::new(1),
            code: "1234".to_string(),
            customer: None,
            excluded_programs: vec![ProgramId::new(5)],
        };

        assert_eq!(scan_args(&request), json!([[1], "1234", false, [5]]));

        request.customer = Some(PartnerId::new(8));

        assert_eq!(scan_args(&request), json!([[1], "1234", 8, [5]]));
    }

    #[test]
    fn decode_result_prefers_data_message() {
        let body = json!({
            "jsonrpc": "2.0",
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": { "message": "Access denied" }
            }
        });

        match decode_result(body) {
            Err(ServiceError::Rpc { code, message }) => {
                assert_eq!(code, 200);
                assert_eq!(message, "Access denied");
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[test]
    fn decode_result_returns_result() -> TestResult {
        let value = decode_result(json!({ "jsonrpc": "2.0", "result": 3 }))?;

        assert_eq!(decode_usage(&value)?, 3);

        Ok(())
    }

    #[test]
    fn decode_usage_rejects_non_numbers() {
        assert!(matches!(
            decode_usage(&json!("three")),
            Err(ServiceError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn decode_scan_accepts_coupon() -> TestResult {
        let outcome = decode_scan(json!({
            "successful": true,
            "payload": { "program_id": 2, "coupon_id": 41 }
        }))?;

        assert_eq!(
            outcome,
            ScanOutcome::Accepted {
                program: ProgramId::new(2),
                coupon: CouponId::new(41),
            }
        );

        Ok(())
    }

    #[test]
    fn decode_scan_surfaces_server_message() -> TestResult {
        let outcome = decode_scan(json!({
            "successful": false,
            "payload": { "error_message": "Coupon has already been used." }
        }))?;

        assert_eq!(
            outcome,
            ScanOutcome::Rejected {
                message: "Coupon has already been used.".to_string(),
            }
        );

        Ok(())
    }

    #[test]
    fn decode_scan_requires_ids_on_success() {
        let result = decode_scan(json!({ "successful": true, "payload": {} }));

        assert!(matches!(result, Err(ServiceError::UnexpectedResponse(_))));
    }

    #[test]
    fn new_trims_trailing_slash() -> TestResult {
        let service = JsonRpcCouponService::new(&RemoteConfig {
            url: "http://localhost:8069/".to_string(),
            timeout_seconds: 5,
            session_cookie: None,
        })?;

        assert_eq!(service.base_url, "http://localhost:8069");

        Ok(())
    }
}
