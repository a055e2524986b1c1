use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::handler::{handle, AppContext};
use crate::repos::config::get_relay_port;

pub async fn run() -> Result<(), Error> {
    let port = get_relay_port();
    let context = Arc::new(AppContext::new());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let context = context.clone();

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(move |req| handle(req, context.clone())))
                .await
            {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}
