//! HMAC middleware for Actix Web.
//!
//! The payment provider signs every webhook delivery with a shared secret. The base64-encoded HMAC-SHA256 of the raw
//! body is sent in a header (`X-Gateway-Signature` by default). Deliveries with a missing or bad signature are refused
//! with a 401, and a [`SignatureRejectedEvent`] is published so that the attempt ends up in the review queue.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use market_common::Secret;
use order_engine::events::{EventProducers, SignatureRejectedEvent};

use crate::{
    errors::{AuthError, ServerError},
    helpers::{get_remote_ip, verify_hmac},
};

pub struct HmacMiddlewareFactory {
    hmac_header: String,
    key: Secret<String>,
    // If false, then the middleware will not check the HMAC signature and always allow the call
    enabled: bool,
    producers: EventProducers,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
}

impl HmacMiddlewareFactory {
    pub fn new(
        hmac_header: &str,
        key: Secret<String>,
        enabled: bool,
        producers: EventProducers,
        use_x_forwarded_for: bool,
        use_forwarded: bool,
    ) -> Self {
        HmacMiddlewareFactory { hmac_header: hmac_header.into(), key, enabled, producers, use_x_forwarded_for, use_forwarded }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            hmac_header: self.hmac_header.clone(),
            key: self.key.clone(),
            enabled: self.enabled,
            producers: self.producers.clone(),
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    hmac_header: String,
    key: Secret<String>,
    enabled: bool,
    producers: EventProducers,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.reveal().clone();
        let hmac_header = self.hmac_header.clone();
        let enabled = self.enabled;
        let producers = self.producers.clone();
        let remote_ip = get_remote_ip(req.request(), self.use_x_forwarded_for, self.use_forwarded);
        Box::pin(async move {
            trace!("🔐️ Checking HMAC for request");
            if !enabled {
                trace!("🔐️ HMAC checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let signature = req.headers().get(&hmac_header).and_then(|v| v.to_str().ok()).map(String::from);
            let details = match signature {
                Some(sig) if verify_hmac(&secret, data.as_ref(), &sig) => {
                    trace!("🔐️ HMAC check for request ✅️");
                    req.set_payload(bytes_to_payload(data));
                    return service.call(req).await;
                },
                Some(_) => "Invalid HMAC signature",
                None => "No HMAC signature",
            };
            let remote_ip = remote_ip.map(|ip| ip.to_string());
            warn!("🔐️ {details} on a webhook delivery from {remote_ip:?}. Denying access.");
            let details = format!("{details} on a {} byte delivery to {}", data.len(), req.path());
            producers.publish_signature_rejected(SignatureRejectedEvent::new(remote_ip, details)).await;
            Err(ServerError::AuthenticationError(AuthError::InvalidSignature).into())
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
