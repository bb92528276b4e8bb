//! Outgoing header injection for client calls.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::middleware::chain::{StreamOpenInterceptor, UnaryInterceptor, UnaryNext};
use crate::net::CallInfo;
use crate::status::Status;

/// Validate `headers` into a `HeaderMap`.
pub fn parse_headers<'a, I>(headers: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

fn inject(mut ctx: Context, headers: &HeaderMap) -> Context {
    for (name, value) in headers {
        ctx.metadata_mut().append(name.clone(), value.clone());
    }
    ctx
}

/// Unary client interceptor appending `headers` to every call's outgoing
/// metadata. Fails if a name or value is not a valid header.
pub fn unary_client_interceptor<'a, Req, Resp, I>(headers: I) -> Result<UnaryInterceptor<Req, Resp>>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let headers = parse_headers(headers)?;
    tracing::debug!(count = headers.len(), "header injection enabled");

    Ok(Arc::new(
        move |ctx: Context,
              req: Req,
              _info: Arc<CallInfo>,
              next: UnaryNext<Req, Resp>|
              -> BoxFuture<'static, std::result::Result<Resp, Status>> {
            next.run(inject(ctx, &headers), req)
        },
    ))
}

/// Stream-open interceptor appending `headers` to the context the stream is
/// opened with.
pub fn stream_client_interceptor<'a, M, I>(
    headers: I,
) -> Result<StreamOpenInterceptor<M>>
where
    M: Send + 'static,
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    unary_client_interceptor(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::chain::{unary_handler_fn, UnaryChain};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_headers_are_appended() {
        let mut headers = BTreeMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        headers.insert("x-tenant".to_string(), "acme".to_string());

        let chain = UnaryChain::new([unary_client_interceptor::<(), String, _>(&headers).unwrap()]);
        let handler = unary_handler_fn(|ctx: Context, _req: ()| async move {
            let md = ctx.metadata();
            Ok(format!(
                "{}/{}",
                md.get("x-api-key").unwrap().to_str().unwrap(),
                md.get("x-tenant").unwrap().to_str().unwrap()
            ))
        });

        let ctx = Context::new().with_header(
            HeaderName::from_static("x-tenant"),
            HeaderValue::from_static("caller"),
        );
        let out = chain.invoke(ctx, (), CallInfo::new("/svc/M"), handler).await.unwrap();

        // the caller's value comes first, configured values are appended
        assert_eq!(out, "secret/caller");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "v".to_string());

        let res = unary_client_interceptor::<(), (), _>(&headers);
        assert!(matches!(res, Err(Error::InvalidHeader { .. })));
    }
}
