use std::net::SocketAddr;

use tokio::net::lookup_host;
use tracing::debug;

use crate::core::{Error, Result};

/// Resolves `host` to the first IPv4 socket address
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let candidates = lookup_host((host, port))
        .await
        .map_err(|e| Error::resolution(format!("{}: {}", host, e)))?;

    let addr = candidates
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| Error::resolution(format!("{} has no IPv4 address", host)))?;

    debug!(%host, %addr, "server address resolved");
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_literal() {
        let addr = resolve("127.0.0.1", 4567).await.unwrap();
        assert_eq!(addr, "127.0.0.1:4567".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_rejects_ipv6_only() {
        let err = resolve("::1", 4567).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_host() {
        let err = resolve("host.invalid", 4567).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}
