//! Collaborator handles.
//!
//! A collaborator owns everything below its mounted prefix. The gateway never
//! looks inside one: it hands over the request and either gets a response
//! back or an error for the fallback to convert.

use std::convert::Infallible;
use std::future::Future;

use axum::{body::Body, http::Request, response::Response};
use futures_util::future::{BoxFuture, FutureExt};
use tower::{Service, ServiceExt};

use crate::error::BoxError;

/// Future returned by [`Collaborator::handle`].
pub type CollaboratorFuture = BoxFuture<'static, Result<Response, BoxError>>;

/// A route handler reached through its path prefix.
pub trait Collaborator: Send + Sync + 'static {
    fn handle(&self, request: Request<Body>) -> CollaboratorFuture;
}

/// Collaborator backed by an async closure.
#[derive(Clone)]
pub struct FnCollaborator<F>(F);

/// Wrap an async closure as a collaborator.
pub fn from_fn<F, Fut>(f: F) -> FnCollaborator<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    FnCollaborator(f)
}

impl<F, Fut> Collaborator for FnCollaborator<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    fn handle(&self, request: Request<Body>) -> CollaboratorFuture {
        (self.0)(request).boxed()
    }
}

/// Collaborator backed by an infallible tower service, e.g. an `axum::Router`.
#[derive(Clone)]
pub struct ServiceCollaborator<S>(S);

impl<S> ServiceCollaborator<S> {
    pub fn new(service: S) -> Self {
        Self(service)
    }
}

impl<S> Collaborator for ServiceCollaborator<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    fn handle(&self, request: Request<Body>) -> CollaboratorFuture {
        let service = self.0.clone();
        async move {
            match service.oneshot(request).await {
                Ok(response) => Ok(response),
                Err(never) => match never {},
            }
        }
        .boxed()
    }
}
