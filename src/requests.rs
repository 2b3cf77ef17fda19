use crate::client::ParseClient;
use crate::error::ParseError;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Response as HttpResponse};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

impl ParseClient {
    // Central request method
    pub(crate) async fn _request<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str, // Takes relative endpoint string
        params: &[(String, String)],
        body: Option<&T>,
    ) -> Result<R, ParseError> {
        let mut full_url = self.endpoint_url(endpoint)?;
        if !params.is_empty() {
            let mut pairs = full_url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        log::debug!("Preparing request: Method={}, URL={}", method, full_url);

        // App ID and Master Key come from the client's default headers.
        let mut request_builder = self.http_client.request(method.clone(), full_url.clone());

        if let Some(body_data) = body {
            let body_str = serde_json::to_string(body_data).map_err(ParseError::JsonError)?;
            log::debug!("Request body: {}", body_str);
            request_builder = request_builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body_str);
        }

        let response = request_builder
            .send()
            .await
            .map_err(ParseError::ReqwestError)?;

        self._send_and_process_response(response, endpoint).await
    }

    pub(crate) async fn _send_and_process_response<R: DeserializeOwned>(
        &self,
        response: HttpResponse,
        endpoint_context: &str,
    ) -> Result<R, ParseError> {
        let status = response.status();
        let response_url = response.url().to_string(); // For logging

        let response_text = response.text().await.map_err(ParseError::ReqwestError)?;

        if status.is_success() {
            // 204 No Content or an empty body still has to deserialize into `Value`.
            let body = if response_text.trim().is_empty() {
                "{}"
            } else {
                response_text.as_str()
            };
            log::debug!("Request to '{}' successful. Response body: {}", endpoint_context, body);
            serde_json::from_str::<R>(body).map_err(|e| {
                log::error!(
                    "JSON Deserialization failed for successful response from '{}'. Status: {}. Error: {}. Body: {}",
                    response_url,
                    status,
                    e,
                    body
                );
                ParseError::JsonDeserializationFailed(format!(
                    "Failed to deserialize successful response from '{}': {}. Body: {}",
                    response_url, e, body
                ))
            })
        } else {
            log::warn!(
                "Request to '{}' failed with status {}. Response body: {}",
                endpoint_context,
                status,
                response_text
            );
            let parsed_body: Value = match serde_json::from_str(&response_text) {
                Ok(json_val) => json_val,
                Err(_) => serde_json::json!({
                    "code": status.as_u16(),
                    "error": format!("HTTP Error {} with non-JSON body", status),
                    "body_snippet": response_text.chars().take(100).collect::<String>(),
                }),
            };
            Err(ParseError::from_response(status.as_u16(), parsed_body))
        }
    }

    // HTTP method wrappers
    pub(crate) async fn get<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<R, ParseError> {
        self._request(Method::GET, endpoint, params, None::<&Value>)
            .await
    }

    pub(crate) async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        data: &T,
    ) -> Result<R, ParseError> {
        self._request(Method::POST, endpoint, &[], Some(data)).await
    }

    pub(crate) async fn put<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        data: &T,
    ) -> Result<R, ParseError> {
        self._request(Method::PUT, endpoint, &[], Some(data)).await
    }

    pub(crate) async fn delete<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ParseError> {
        self._request(Method::DELETE, endpoint, &[], None::<&Value>)
            .await
    }
}
