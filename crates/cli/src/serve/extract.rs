//! Body extractors whose rejections go through [`ApiError`], so a malformed
//! body gets the same `{"success": false, "error": ...}` shape as every
//! other failure.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{FromRequest, Request};
use axum::{Form, Json};

use super::error::ApiError;

/// `Json<T>` with a JSON rejection.
#[derive(Debug)]
pub(crate) struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Form<T>` with a JSON rejection.
#[derive(Debug)]
pub(crate) struct ApiForm<T>(pub T);

impl<S, T> FromRequest<S> for ApiForm<T>
where
    Form<T>: FromRequest<S, Rejection = FormRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{self, header, StatusCode};
    use axum::response::IntoResponse;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Message {
        message: String,
    }

    fn post(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn valid_json_is_extracted() {
        let req = post(Some("application/json"), r#"{"message":"hi"}"#);
        let ApiJson(msg) = ApiJson::<Message>::from_request(req, &()).await.unwrap();
        assert_eq!(msg.message, "hi");
    }

    #[tokio::test]
    async fn malformed_json_is_json_400() {
        let req = post(Some("application/json"), "{not json");
        let err = ApiJson::<Message>::from_request(req, &()).await.unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn missing_content_type_is_json_415() {
        let req = post(Some("text/plain"), r#"{"message":"hi"}"#);
        let err = ApiJson::<Message>::from_request(req, &()).await.unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn wrong_field_type_is_json_422() {
        let req = post(Some("application/json"), r#"{"message":7}"#);
        let err = ApiJson::<Message>::from_request(req, &()).await.unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn form_without_form_content_type_is_json_error() {
        let req = post(Some("application/json"), "message=hi");
        let err = ApiForm::<Message>::from_request(req, &()).await.unwrap_err();
        let (status, body) = error_body(err).await;
        assert!(status.is_client_error());
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn valid_form_is_extracted() {
        let req = post(Some("application/x-www-form-urlencoded"), "message=hi%20there");
        let ApiForm(msg) = ApiForm::<Message>::from_request(req, &()).await.unwrap();
        assert_eq!(msg.message, "hi there");
    }
}
