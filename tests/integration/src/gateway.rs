//! Mock gateway
//!
//! Accepts WebSocket connections and hands each one to the test as a
//! [`GatewayConn`], which the test drives step by step. Server frames are
//! zlib-stream compressed with one compressor per connection, the same way
//! the real gateway sends them.

use anyhow::{anyhow, bail, Result};
use chatlink_gateway::{GatewayMessage, OpCode};
use flate2::{Compress, Compression, FlushCompress};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// How long a test waits for the client to do something
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Running mock gateway
pub struct MockGateway {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<GatewayConn>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, connections) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Ok(conn) = GatewayConn::accept(stream).await {
                        let _ = tx.send(conn);
                    }
                });
            }
        });

        Ok(Self {
            addr,
            connections,
            _handle: handle,
        })
    }

    /// Base URL as `/gateway/bot` or READY would hand it out
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next client connection
    pub async fn accept(&mut self) -> Result<GatewayConn> {
        timeout(STEP_TIMEOUT, self.connections.recv())
            .await
            .map_err(|_| anyhow!("client did not connect"))?
            .ok_or_else(|| anyhow!("gateway listener stopped"))
    }
}

/// Server side of one client connection
pub struct GatewayConn {
    ws: WebSocketStream<TcpStream>,
    compress: Compress,
    query: String,
}

impl GatewayConn {
    async fn accept(stream: TcpStream) -> Result<Self> {
        let query = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&query);
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            *captured.lock() = request.uri().query().unwrap_or_default().to_string();
            Ok(response)
        };

        let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
        let query = query.lock().clone();
        Ok(Self {
            ws,
            compress: Compress::new(Compression::default(), true),
            query,
        })
    }

    /// Query string the client connected with
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Send a message as one compressed binary frame
    pub async fn send(&mut self, message: &GatewayMessage) -> Result<()> {
        let bytes = self.compress_message(message)?;
        self.ws.send(Message::Binary(bytes)).await?;
        Ok(())
    }

    /// Send a message split across two binary frames
    pub async fn send_split(&mut self, message: &GatewayMessage) -> Result<()> {
        let mut bytes = self.compress_message(message)?;
        let tail = bytes.split_off(bytes.len() / 2);
        self.ws.send(Message::Binary(bytes)).await?;
        self.ws.send(Message::Binary(tail)).await?;
        Ok(())
    }

    /// Send a message as an uncompressed text frame
    pub async fn send_text(&mut self, message: &GatewayMessage) -> Result<()> {
        self.ws.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    pub async fn hello(&mut self, heartbeat_interval_ms: u64) -> Result<()> {
        self.send(&GatewayMessage::hello(heartbeat_interval_ms)).await
    }

    pub async fn dispatch(&mut self, event: &str, sequence: u64, data: Value) -> Result<()> {
        self.send(&GatewayMessage::dispatch(event, sequence, data)).await
    }

    fn compress_message(&mut self, message: &GatewayMessage) -> Result<Vec<u8>> {
        let json = message.to_json()?;
        let mut out = Vec::with_capacity(json.len() * 2 + 1024);
        self.compress
            .compress_vec(json.as_bytes(), &mut out, FlushCompress::Sync)?;
        Ok(out)
    }

    /// Next message from the client; `None` once the client closed
    pub async fn recv_raw(&mut self) -> Result<Option<GatewayMessage>> {
        loop {
            let frame = timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| anyhow!("client sent nothing"))?;
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(Some(GatewayMessage::from_json(&text)?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Binary(_))) => bail!("client sent a binary frame"),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Next message from the client that is not a heartbeat
    pub async fn recv(&mut self) -> Result<GatewayMessage> {
        loop {
            match self.recv_raw().await? {
                Some(message) if message.op == OpCode::Heartbeat => {}
                Some(message) => return Ok(message),
                None => bail!("client closed the connection"),
            }
        }
    }

    /// Next non-heartbeat message, which must carry `op`
    pub async fn expect(&mut self, op: OpCode) -> Result<GatewayMessage> {
        let message = self.recv().await?;
        if message.op != op {
            bail!("expected {op}, got {message}");
        }
        Ok(message)
    }

    /// Read until the client closes; returns the close code it sent
    pub async fn recv_close(&mut self) -> Result<Option<u16>> {
        loop {
            let frame = timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| anyhow!("client did not close"))?;
            match frame {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| u16::from(f.code))),
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Ok(None),
            }
        }
    }

    /// Close the connection with a gateway close code
    pub async fn close(mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.ws.close(Some(frame)).await?;
        Ok(())
    }
}
