//! CONNECT tunneling. Bytes are spliced opaquely; TLS is never terminated.

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::context::ProxyContext;
use super::response_ext::{empty_response, text_response, ProxyBody, ResponseExt};
use crate::config::RuleAction;
use crate::metrics::{self, Outcome};
use crate::rules::resolve_action;

const DEFAULT_TUNNEL_PORT: u16 = 443;

/// Answer a CONNECT request and, on success, splice client and target.
pub async fn handle_connect(ctx: Arc<ProxyContext>, req: Request<Incoming>) -> Response<ProxyBody> {
    let Some(authority) = req.uri().authority().cloned() else {
        metrics::record_outcome(Outcome::TunnelRefused);
        return text_response(StatusCode::BAD_REQUEST, "CONNECT target must be host:port")
            .into_boxed();
    };
    info!("CONNECT request for {}", authority);

    let (config, rules) = ctx.config.current();
    if config.offline_mode {
        metrics::record_outcome(Outcome::TunnelRefused);
        return text_response(StatusCode::SERVICE_UNAVAILABLE, "Offline mode: tunneling disabled")
            .into_boxed();
    }
    let (action, applied_rule) = resolve_action(&config, &rules, "CONNECT", authority.as_str());
    if action == RuleAction::ReturnMock {
        debug!("CONNECT {} refused by rule {:?}", authority, applied_rule);
        metrics::record_outcome(Outcome::TunnelRefused);
        return text_response(StatusCode::FORBIDDEN, "Tunnel to this host is not allowed")
            .into_boxed();
    }

    let host = authority.host().to_string();
    let port = authority.port_u16().unwrap_or(DEFAULT_TUNNEL_PORT);
    let target = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Problem connecting to {}:{}: {}", host, port, e);
            metrics::record_outcome(Outcome::TunnelRefused);
            return text_response(StatusCode::BAD_GATEWAY, format!("Tunnel failed: {e}"))
                .into_boxed();
        }
    };

    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => {
                let mut client = TokioIo::new(upgraded);
                let mut target = target;
                match tokio::io::copy_bidirectional(&mut client, &mut target).await {
                    Ok((up, down)) => debug!(
                        "Tunnel {}:{} closed ({} bytes up, {} bytes down)",
                        host, port, up, down
                    ),
                    Err(e) => debug!("Tunnel {}:{} ended: {}", host, port, e),
                }
            }
            Err(e) => warn!("CONNECT upgrade failed for {}:{}: {}", host, port, e),
        }
    });

    metrics::record_outcome(Outcome::Tunnel);
    let mut response = empty_response(StatusCode::OK);
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(b"Connection Established"));
    response
}
