use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{AuthError, Result};

/// A fully read response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The two calls the client-credentials grant makes against an issuer.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<HttpResponse>;

    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<HttpResponse>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn fetch(&self, url: &Url) -> Result<HttpResponse> {
        let response = reqwest::Client::get(self, url.clone())
            .send()
            .await
            .map_err(|err| connection_error(url, err))?;
        read(url, response).await
    }

    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<HttpResponse> {
        let response = reqwest::Client::post(self, url.clone())
            .form(form)
            .send()
            .await
            .map_err(|err| connection_error(url, err))?;
        read(url, response).await
    }
}

async fn read(url: &Url, response: reqwest::Response) -> Result<HttpResponse> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| connection_error(url, err))?;
    Ok(HttpResponse { status, body })
}

fn connection_error(url: &Url, err: reqwest::Error) -> crate::error::Error {
    AuthError::Connection {
        url: url.to_string(),
        message: err.to_string(),
    }
    .into()
}
