use crate::ProviderError;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A file attached to a multipart POST.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: &'static str,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// The HTTP calls the service clients need. Non-2xx statuses are returned as
/// responses; only transport failures are errors.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_file(&self, url: &str, file: FilePart) -> Result<HttpResponse, ProviderError>;

    async fn get(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
        user_agent: &str,
    ) -> Result<HttpResponse, ProviderError>;
}

#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_file(&self, url: &str, file: FilePart) -> Result<HttpResponse, ProviderError> {
        let part = Part::bytes(file.bytes).file_name(file.file_name);
        let form = Form::new().part(file.field, part);
        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        read_response(resp).await
    }

    async fn get(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
        user_agent: &str,
    ) -> Result<HttpResponse, ProviderError> {
        let mut builder = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent);
        if let Some(auth) = auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        read_response(resp).await
    }
}

async fn read_response(resp: Response) -> Result<HttpResponse, ProviderError> {
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
    Ok(HttpResponse { status, body })
}
