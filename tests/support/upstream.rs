use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::read_until_double_crlf;

#[derive(Clone)]
enum UpstreamBehavior {
    /// Read the request head, send nothing back and close.
    Close,
    /// Read the request head, write the canned response and close.
    HttpResponse { response: Arc<Vec<u8>> },
}

/// Loopback origin server that counts connections and records each request head it receives.
pub struct TestUpstream {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    handle: JoinHandle<()>,
}

impl TestUpstream {
    pub async fn close() -> Result<Self> {
        Self::spawn(UpstreamBehavior::Close).await
    }

    pub async fn http_response(response: impl Into<Vec<u8>>) -> Result<Self> {
        Self::spawn(UpstreamBehavior::HttpResponse {
            response: Arc::new(response.into()),
        })
        .await
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().clone()
    }

    async fn spawn(behavior: UpstreamBehavior) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handle = {
            let hits = hits.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                loop {
                    let (mut stream, _) = match listener.accept().await {
                        Ok(conn) => conn,
                        Err(_) => break,
                    };
                    hits.fetch_add(1, Ordering::SeqCst);
                    let behavior = behavior.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let _ = handle_connection(&mut stream, behavior, requests).await;
                    });
                }
            })
        };
        Ok(Self {
            addr,
            hits,
            requests,
            handle,
        })
    }
}

impl Drop for TestUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: &mut TcpStream,
    behavior: UpstreamBehavior,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
) -> Result<()> {
    let head = read_until_double_crlf(stream).await?;
    requests.lock().push(head);
    match behavior {
        UpstreamBehavior::Close => {}
        UpstreamBehavior::HttpResponse { response } => {
            if let Err(err) = stream.write_all(&response).await {
                if err.kind() != ErrorKind::BrokenPipe {
                    return Err(err.into());
                }
            }
        }
    }
    stream.shutdown().await.ok();
    // Drain anything else so closing does not reset the connection.
    let mut sink = [0u8; 256];
    while let Ok(n) = stream.read(&mut sink).await {
        if n == 0 {
            break;
        }
    }
    Ok(())
}
