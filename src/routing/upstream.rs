//! Forwarding collaborator requests to upstream HTTP services.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream authority (path and query kept)
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Stream bodies; no buffering, no retries
//!
//! # Design Decisions
//! - One pooled client shared by every mount
//! - Transport failures are collaborator errors (generic 500 to the client)

use axum::{
    body::Body,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, InvalidUri, PathAndQuery, Scheme},
        Request, Uri, Version,
    },
    response::Response,
};
use futures_util::future::FutureExt;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::BoxError;
use crate::routing::collaborator::{Collaborator, CollaboratorFuture};
use crate::security::peer_addr;

/// Pooled HTTP/1.1 client shared by upstream collaborators.
pub type HttpClient = Client<HttpConnector, Body>;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Build the shared upstream client.
pub fn http_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Error for an unusable upstream base URL.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamUrlError {
    #[error(transparent)]
    Invalid(#[from] InvalidUri),

    #[error("upstream URL {0:?} has no authority")]
    MissingAuthority(String),

    #[error("upstream URL {0:?} must not carry a path or query")]
    HasPath(String),
}

/// Collaborator living behind an upstream HTTP service.
#[derive(Clone)]
pub struct UpstreamCollaborator {
    name: String,
    scheme: Scheme,
    authority: Authority,
    client: HttpClient,
}

impl std::fmt::Debug for UpstreamCollaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCollaborator")
            .field("name", &self.name)
            .field("authority", &self.authority)
            .finish()
    }
}

impl UpstreamCollaborator {
    /// Create a collaborator forwarding to `base_url` (e.g. `http://127.0.0.1:6001`).
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        client: HttpClient,
    ) -> Result<Self, UpstreamUrlError> {
        let uri: Uri = base_url.parse()?;
        if uri.path_and_query().is_some_and(|pq| pq.as_str() != "/") {
            return Err(UpstreamUrlError::HasPath(base_url.to_string()));
        }
        let parts = uri.into_parts();
        let authority = parts
            .authority
            .ok_or_else(|| UpstreamUrlError::MissingAuthority(base_url.to_string()))?;

        Ok(Self {
            name: name.into(),
            scheme: parts.scheme.unwrap_or(Scheme::HTTP),
            authority,
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Turn an inbound request into the request sent upstream.
    pub fn forward_request(&self, request: Request<Body>) -> Result<Request<Body>, BoxError> {
        let (mut parts, body) = request.into_parts();

        let client_ip = peer_addr(&parts.extensions).map(|addr| addr.ip());
        let original_host = parts.headers.get(header::HOST).cloned();

        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(self.scheme.clone());
        uri_parts.authority = Some(self.authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        parts.uri = Uri::from_parts(uri_parts)?;
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);

        if let Some(ip) = client_ip {
            let forwarded_for = match parts.headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(existing) => format!("{existing}, {ip}"),
                None => ip.to_string(),
            };
            parts
                .headers
                .insert(X_FORWARDED_FOR, HeaderValue::from_str(&forwarded_for)?);
        }
        parts
            .headers
            .insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
        if let Some(host) = original_host {
            parts.headers.insert(X_FORWARDED_HOST, host);
        }

        Ok(Request::from_parts(parts, body))
    }
}

impl Collaborator for UpstreamCollaborator {
    fn handle(&self, request: Request<Body>) -> CollaboratorFuture {
        let client = self.client.clone();
        let forwarded = self.forward_request(request);
        async move {
            let response: Response<Incoming> = client.request(forwarded?).await?;
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Ok::<_, BoxError>(Response::from_parts(parts, Body::new(body)))
        }
        .boxed()
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
