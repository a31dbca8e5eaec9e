//! Registration body extractor accepting JSON or form-encoded submissions.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use domain::models::RegisterRequest;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::ApiError;

/// A registration submission, whatever its encoding.
///
/// Form posts carry extra CRM attributes as `attributes[NAME]=value` fields.
#[derive(Debug, Clone)]
pub struct RegistrationPayload(pub RegisterRequest);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

fn from_form_fields(mut fields: HashMap<String, String>) -> RegisterRequest {
    let attributes: BTreeMap<String, Value> = fields
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix("attributes[")?.strip_suffix(']')?;
            let value = value.trim();
            (!name.is_empty() && !value.is_empty())
                .then(|| (name.to_string(), Value::String(value.to_string())))
        })
        .collect();

    RegisterRequest {
        email: fields.remove("email").unwrap_or_default(),
        name: fields.remove("name").unwrap_or_default(),
        phone: fields.remove("phone").unwrap_or_default(),
        attributes,
    }
}

#[async_trait]
impl<S> FromRequest<S> for RegistrationPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            return Ok(Self(from_form_fields(fields)));
        }

        let Json(request) = Json::<RegisterRequest>::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        Ok(Self(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn extract(content_type: &str, body: &str) -> Result<RegisterRequest, ApiError> {
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        RegistrationPayload::from_request(req, &())
            .await
            .map(|p| p.0)
    }

    #[tokio::test]
    async fn test_json_body() {
        let request = extract(
            "application/json",
            r#"{"email":"a@x.com","name":"Ann","attributes":{"company":"Acme"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(request.email, "a@x.com");
        assert_eq!(request.name, "Ann");
        assert_eq!(request.phone, "");
        assert_eq!(request.attributes["company"], "Acme");
    }

    #[tokio::test]
    async fn test_form_body_with_attributes() {
        let request = extract(
            "application/x-www-form-urlencoded; charset=utf-8",
            "email=b%40x.com&name=Bob&phone=%2B1555&attributes%5Bcompany%5D=Acme&other=1",
        )
        .await
        .unwrap();
        assert_eq!(request.email, "b@x.com");
        assert_eq!(request.phone, "+1555");
        assert_eq!(request.attributes.len(), 1);
        assert_eq!(request.attributes["company"], "Acme");
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let err = extract("application/json", "{not json").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_content_type_rejected() {
        let req = Request::builder()
            .method("POST")
            .body(Body::from("{}"))
            .unwrap();
        let err = RegistrationPayload::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
