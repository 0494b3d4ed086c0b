//! HTTP wiring: decodes a Kubernetes `AdmissionReview` request, dispatches
//! it through `admission-runtime`, and encodes the `AdmissionReview`
//! response. This is deliberately the only place in the workspace that
//! knows the admission webhook wire format — everything upstream of
//! [`Dispatcher::dispatch`] works with plain Rust values (spec §1: "the
//! HTTP/API transport... remain external collaborators").
//!
//! Building the outgoing JSON patch for a mutation is left to a future
//! transport integration: this controller reports `allowed`/`denied` and the
//! structured reason, which is the part of the wire contract this repo's
//! scope actually covers.

use std::sync::Arc;

use admission_core::error::{ErrorKind, Forbid};
use admission_core::model::{Operation, UserInfo};
use admission_runtime::{Dispatcher, RawRequest};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionReviewRequest {
    request: AdmissionRequestBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionRequestBody {
    uid: String,
    kind: RequestKind,
    #[serde(default)]
    namespace: String,
    name: String,
    operation: String,
    #[serde(default)]
    sub_resource: Option<String>,
    user_info: AdmissionUserInfo,
    #[serde(default)]
    object: Option<serde_json::Value>,
    #[serde(default)]
    old_object: Option<serde_json::Value>,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct RequestKind {
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionUserInfo {
    username: String,
    #[serde(default)]
    groups: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionReviewResponse {
    api_version: &'static str,
    kind: &'static str,
    response: AdmissionResponseBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionResponseBody {
    uid: String,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<AdmissionStatus>,
}

#[derive(Debug, Serialize)]
struct AdmissionStatus {
    code: u16,
    message: String,
}

fn parse_operation(raw: &str) -> Result<Operation, Forbid> {
    match raw {
        "CREATE" => Ok(Operation::Create),
        "UPDATE" => Ok(Operation::Update),
        "DELETE" => Ok(Operation::Delete),
        "CONNECT" => Ok(Operation::Connect),
        other => Err(Forbid::bad_request("request.operation", format!("unrecognized operation \"{other}\""))),
    }
}

fn error_code(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::NotReady => 503,
        ErrorKind::BadRequest => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::Forbidden => 403,
        ErrorKind::Unauthorized => 401,
        ErrorKind::InternalError => 500,
    }
}

fn into_raw_request(body: AdmissionRequestBody) -> Result<RawRequest, Forbid> {
    Ok(RawRequest {
        operation: parse_operation(&body.operation)?,
        kind: body.kind.kind,
        namespace: body.namespace,
        name: body.name,
        subresource: body.sub_resource,
        user_info: UserInfo { name: body.user_info.username, groups: body.user_info.groups },
        new_object: body.object,
        old_object: body.old_object,
        dry_run: body.dry_run,
    })
}

fn handle(dispatcher: &Dispatcher, uid: String, body: AdmissionRequestBody) -> AdmissionResponseBody {
    let outcome = into_raw_request(body).and_then(|request| dispatcher.dispatch(request));

    match outcome {
        Ok(_) => AdmissionResponseBody { uid, allowed: true, status: None },
        Err(forbid) => {
            tracing::debug!(%forbid, "admission request denied");
            AdmissionResponseBody {
                uid,
                allowed: false,
                status: Some(AdmissionStatus { code: error_code(forbid.kind()), message: forbid.to_string() }),
            }
        }
    }
}

#[tracing::instrument(skip(dispatcher, review))]
async fn admit(State(dispatcher): State<Arc<Dispatcher>>, Json(review): Json<AdmissionReviewRequest>) -> Json<AdmissionReviewResponse> {
    let uid = review.request.uid.clone();
    let response = handle(&dispatcher, uid, review.request);

    Json(AdmissionReviewResponse { api_version: "admission.k8s.io/v1", kind: "AdmissionReview", response })
}

/// Builds the axum router serving the admission webhook endpoint. Every
/// resource kind is handled by the same `/admit` route; the dispatcher picks
/// the interested plugins by the request's `kind`.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new().route("/admit", post(admit)).with_state(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use admission_core::cache::ReadinessGate;
    use admission_core::error::ErrorKind;

    #[test]
    fn unknown_operation_is_a_bad_request() {
        let err = parse_operation("PATCH").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn known_operations_parse() {
        assert_eq!(parse_operation("CREATE").unwrap(), Operation::Create);
        assert_eq!(parse_operation("UPDATE").unwrap(), Operation::Update);
        assert_eq!(parse_operation("DELETE").unwrap(), Operation::Delete);
        assert_eq!(parse_operation("CONNECT").unwrap(), Operation::Connect);
    }

    #[test]
    fn not_ready_dispatcher_denies_with_503() {
        let dispatcher = Dispatcher::new(vec![], ReadinessGate::new());
        let body = AdmissionRequestBody {
            uid: "abc".to_string(),
            kind: RequestKind { kind: "Cluster".to_string() },
            namespace: "garden-foo".to_string(),
            name: "shoot-a".to_string(),
            operation: "CREATE".to_string(),
            sub_resource: None,
            user_info: AdmissionUserInfo { username: "alice".to_string(), groups: vec![] },
            object: Some(serde_json::json!({})),
            old_object: None,
            dry_run: false,
        };

        let response = handle(&dispatcher, "abc".to_string(), body);
        assert!(!response.allowed);
        assert_eq!(response.status.unwrap().code, 503);
    }
}
