use crate::headers::filter_hop_by_hop_headers;
use crate::state::SharedState;
use bytes::Bytes;
use chrono::Utc;
use egress_log_model::{LogEntry, Protocol, SignedLogEntry};
use egress_log_store::LogStore;
use http::{Method, Request, Response, StatusCode, Uri};
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpStream;

pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

fn empty_body() -> ProxyBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

fn text_body(text: impl Into<Bytes>) -> ProxyBody {
    Full::new(text.into()).map_err(|never| match never {}).boxed()
}

fn error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    Response::builder()
        .status(status)
        .body(text_body(message.to_string()))
        .expect("static response is always well-formed")
}

/// Top-level request dispatch: CONNECT tunnels vs. plain HTTP forwarding.
pub async fn handle<S: LogStore + 'static>(
    req: Request<Incoming>,
    state: Arc<SharedState<S>>,
) -> Result<Response<ProxyBody>, hyper::Error> {
    if req.method() == Method::CONNECT {
        Ok(handle_connect(req, state).await)
    } else {
        Ok(handle_forward(req, state).await)
    }
}

/// Logs the `egress` entry for this request/tunnel and appends it to the
/// chain. The entry is recorded before any network activity against the
/// target, so the audit claim ("this function attempted contact with H")
/// holds even if the attempt then fails (spec §4.D step 4).
async fn log_egress<S: LogStore>(
    state: &SharedState<S>,
    method: String,
    host: String,
    port: u16,
    path: String,
    protocol: Protocol,
) -> Result<SignedLogEntry, egress_log_store::LogStoreError> {
    let function_id = state.function_id.clone();
    let invocation_id = state.invocation.current();
    let signer = state.signer.clone();

    state
        .sequencer
        .append_next(&function_id, move |sequence| {
            let function_id = function_id.clone();
            async move {
                let entry = LogEntry::Egress {
                    sequence,
                    function_id,
                    invocation_id,
                    timestamp: Utc::now(),
                    method,
                    host,
                    port,
                    path,
                    protocol,
                };
                let signature = signer
                    .sign(&entry)
                    .map_err(|e| egress_log_store::LogStoreError::Build(e.to_string()))?;
                Ok(SignedLogEntry { entry, signature })
            }
        })
        .await
}

async fn handle_forward<S: LogStore>(
    req: Request<Incoming>,
    state: Arc<SharedState<S>>,
) -> Response<ProxyBody> {
    state.metrics.requests_total.inc();

    let uri = req.uri().clone();
    let (host, port, path) = match parse_absolute_form(&uri) {
        Ok(parts) => parts,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    if let Err(e) = log_egress(
        &state,
        req.method().to_string(),
        host.clone(),
        port,
        path.clone(),
        Protocol::Http,
    )
    .await
    {
        state.metrics.log_append_failures_total.inc();
        tracing::error!(error = %e, "failed to append egress log entry, refusing to forward");
        return error_response(StatusCode::BAD_GATEWAY, "failed to record audit entry");
    }

    let filtered_headers = filter_hop_by_hop_headers(req.headers());
    let (parts, body) = req.into_parts();

    let stream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, %host, port, "upstream connect failed");
            return error_response(StatusCode::BAD_GATEWAY, "upstream connect failed");
        }
    };
    let io = TokioIo::new(stream);

    let (mut sender, connection) = match hyper::client::conn::http1::handshake(io).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, "upstream handshake failed");
            return error_response(StatusCode::BAD_GATEWAY, "upstream handshake failed");
        }
    };
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "upstream connection closed");
        }
    });

    let mut upstream_req_builder = Request::builder().method(parts.method).uri(path);
    for (name, value) in filtered_headers.iter() {
        upstream_req_builder = upstream_req_builder.header(name, value);
    }
    let upstream_req = match upstream_req_builder.body(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build upstream request");
            return error_response(StatusCode::BAD_GATEWAY, "malformed upstream request");
        }
    };

    match sender.send_request(upstream_req).await {
        Ok(upstream_resp) => {
            let (parts, body) = upstream_resp.into_parts();
            Response::from_parts(parts, body.boxed())
        }
        Err(e) => {
            tracing::warn!(error = %e, "upstream request failed");
            error_response(StatusCode::BAD_GATEWAY, "upstream request failed")
        }
    }
}

async fn handle_connect<S: LogStore>(
    req: Request<Incoming>,
    state: Arc<SharedState<S>>,
) -> Response<ProxyBody> {
    state.metrics.connect_tunnels_total.inc();

    let authority = match req.uri().authority() {
        Some(authority) => authority.clone(),
        None => return error_response(StatusCode::BAD_REQUEST, "CONNECT target is not authority-form"),
    };
    let host = authority.host().to_string();
    let port = authority.port_u16().unwrap_or(443);

    if let Err(e) = log_egress(
        &state,
        Method::CONNECT.to_string(),
        host.clone(),
        port,
        "/".to_string(),
        Protocol::Https,
    )
    .await
    {
        state.metrics.log_append_failures_total.inc();
        tracing::error!(error = %e, "failed to append egress log entry, refusing to tunnel");
        return error_response(StatusCode::BAD_GATEWAY, "failed to record audit entry");
    }

    let target = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, %host, port, "CONNECT target unreachable");
            return error_response(StatusCode::BAD_GATEWAY, "connect target unreachable");
        }
    };

    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => {
                let mut client_io = TokioIo::new(upgraded);
                let mut target = target;
                if let Err(e) =
                    tokio::io::copy_bidirectional(&mut client_io, &mut target).await
                {
                    tracing::debug!(error = %e, "CONNECT tunnel closed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to upgrade CONNECT request"),
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .body(empty_body())
        .expect("static response is always well-formed")
}

fn parse_absolute_form(uri: &Uri) -> Result<(String, u16, String), String> {
    let authority = uri
        .authority()
        .ok_or_else(|| "request line is not absolute-form".to_string())?;
    let host = authority.host().to_string();
    let port = authority.port_u16().unwrap_or(80);
    let path = uri
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| "/".to_string());
    Ok((host, port, path))
}
