use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionCoordinator;
use crate::types::{ApiEnvelope, RequestConfig, RequestOptions};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Entry point of the SDK.
///
/// Auth operations live on [`QueekClient::auth`]; the verb helpers send
/// arbitrary API calls through the same session, so they share token
/// attachment and refresh-on-401.
#[derive(Debug, Clone)]
pub struct QueekClient {
    session: SessionCoordinator,
}

impl QueekClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            session: SessionCoordinator::new(config)?,
        })
    }

    pub fn auth(&self) -> &SessionCoordinator {
        &self.session
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> ClientResult<ApiEnvelope<T>> {
        self.session.request(config).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ClientResult<ApiEnvelope<T>> {
        self.request(RequestConfig::get(path).with_options(options))
            .await
    }

    pub async fn post<T, B>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> ClientResult<ApiEnvelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::POST, path, body, options).await
    }

    pub async fn put<T, B>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> ClientResult<ApiEnvelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::PUT, path, body, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ClientResult<ApiEnvelope<T>> {
        self.request(RequestConfig::new(Method::DELETE, path).with_options(options))
            .await
    }

    async fn send_with_body<T, B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> ClientResult<ApiEnvelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Encode(Arc::new(e)))?;
        self.request(
            RequestConfig::new(method, path)
                .with_body(body)
                .with_options(options),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientMode;
    use crate::transport::{HttpRequest, HttpResponse, HttpSend};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use queek_storage::{MemoryStorage, StorageKeys, TokenStorage};
    use serde_json::{json, Value};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpSend for Recorder {
        async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
            self.seen.lock().push(request);
            Ok(HttpResponse::json(
                200,
                &json!({"status": "success", "message": "ok", "data": {"ok": true}}),
            ))
        }
    }

    fn client(http: Arc<Recorder>) -> QueekClient {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(StorageKeys::ACCESS_TOKEN, "access-1").unwrap();
        QueekClient::new(
            ClientConfig::new("https://api.example.com/api/v1")
                .with_mode(ClientMode::HostedStorefront)
                .with_vendor_slug("vendor-hosted")
                .with_storage(storage)
                .with_http(http),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_verbs_use_matching_methods() {
        let http = Arc::new(Recorder::default());
        let client = client(http.clone());

        let _: ApiEnvelope<Value> = client.get("/a", RequestOptions::default()).await.unwrap();
        let _: ApiEnvelope<Value> = client
            .post("/b", &json!({"x": 1}), RequestOptions::default())
            .await
            .unwrap();
        let _: ApiEnvelope<Value> = client
            .put("/c", &json!({"y": 2}), RequestOptions::default())
            .await
            .unwrap();
        let _: ApiEnvelope<Value> = client.delete("/d", RequestOptions::default()).await.unwrap();

        let seen = http.seen.lock();
        let methods: Vec<Method> = seen.iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]);
        assert!(seen.iter().all(|r| r.header("authorization") == Some("Bearer access-1")));
        assert!(seen[0].body.is_none());
        assert_eq!(seen[1].json_body(), Some(json!({"x": 1})));
        assert_eq!(seen[2].json_body(), Some(json!({"y": 2})));
        assert!(seen[3].body.is_none());
    }

    #[tokio::test]
    async fn test_typed_payload_decoding() {
        #[derive(serde::Deserialize)]
        struct Flag {
            ok: bool,
        }

        let client = client(Arc::new(Recorder::default()));
        let envelope: ApiEnvelope<Flag> = client.get("/flag", RequestOptions::default()).await.unwrap();
        assert!(envelope.data.ok);
        assert_eq!(envelope.status, "success");
    }

    #[tokio::test]
    async fn test_decode_mismatch_is_decode_error() {
        let client = client(Arc::new(Recorder::default()));
        let result: ClientResult<ApiEnvelope<Vec<String>>> =
            client.get("/flag", RequestOptions::default()).await;
        assert!(matches!(result, Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_construction_validates_config() {
        let err = QueekClient::new(ClientConfig::new("https://api.example.com")).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
