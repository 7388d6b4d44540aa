use crate::error::{ListenerError, Result};
use log::{error, info};
use std::io;
use std::net::{IpAddr, TcpListener};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to the cluster and returns the local interface address the OS
/// picked for that route. The callback URL is built from this address.
pub async fn check_outbound_connectivity(remote_host: &str, remote_port: u16) -> Result<IpAddr> {
    let endpoint = format!("{remote_host}:{remote_port}");
    info!("Checking connectivity with {endpoint}");

    let connect = TcpStream::connect((remote_host, remote_port));
    let stream = match timeout(CONNECT_TIMEOUT, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            error!("Error while connecting to {endpoint}: {source}");
            return Err(ListenerError::Connectivity { endpoint, source });
        }
        Err(_) => {
            error!("Timed out connecting to {endpoint}");
            return Err(ListenerError::Connectivity {
                endpoint,
                source: io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
            });
        }
    };

    let local_ip = stream
        .local_addr()
        .map_err(|source| ListenerError::Connectivity {
            endpoint: endpoint.clone(),
            source,
        })?
        .ip();
    info!("Connectivity verified with {endpoint} using local IP {local_ip}");
    Ok(local_ip)
}

/// Binds the port and releases it right away.
pub fn check_port_availability(port: u16) -> Result<()> {
    info!("Checking if port {port} is available");
    match TcpListener::bind(("0.0.0.0", port)) {
        Ok(socket) => {
            drop(socket);
            Ok(())
        }
        Err(source) => {
            error!("Port {port} cannot be used: {source}");
            Err(ListenerError::PortUnavailable { port, source })
        }
    }
}
