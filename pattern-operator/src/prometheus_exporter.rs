use std::{net::SocketAddr, sync::Arc};

use http_body_util::Full;
use hyper::{
    body::Bytes, header::CONTENT_TYPE, server::conn::http1, service::service_fn, Request,
    Response,
};
use hyper_util::rt::TokioIo;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;

/// Installs a global meter provider exporting into `registry`.
pub(crate) fn init_meter_provider(registry: &Registry) -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;
    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
    opentelemetry::global::set_meter_provider(provider.clone());
    Ok(provider)
}

async fn serve_req<B>(
    _req: Request<B>,
    registry: Arc<Registry>,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut result = Vec::new();
    match encoder.encode(&metric_families, &mut result) {
        Ok(_) => Response::builder()
            .status(200)
            .header(CONTENT_TYPE, encoder.format_type())
            .body(Full::new(Bytes::from(result))),
        Err(e) => {
            error!("{}", e);
            Response::builder().status(500).body(Full::new(Bytes::new()))
        }
    }
}

pub(crate) async fn start_prometheus_metrics_server(
    addr: SocketAddr,
    registry: Registry,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    debug!("Listening on http://{}", addr);
    let registry = Arc::new(registry);
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let registry = registry.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| serve_req(req, registry.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("metrics connection failed: {}", e);
            }
        });
    }
}
