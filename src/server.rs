use crate::errors::error_response;
use crate::http::parse::{HttpParser, ParseLimits};
use crate::http::request::Method;
use crate::routing::Dispatcher;
use std::io::{self, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Thread-per-connection HTTP listener. Each connection carries exactly one
/// request and is closed after the response.
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    parser: Arc<HttpParser>,
    io_timeout: Duration,
    running: Arc<AtomicBool>,
}

/// Stops a running [`Server`] from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // Wake the blocking accept so the loop sees the flag
        let _ = TcpStream::connect(self.addr);
    }
}

impl Server {
    pub fn bind<A: ToSocketAddrs>(addr: A, dispatcher: Arc<Dispatcher>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Server {
            listener,
            dispatcher,
            parser: Arc::new(HttpParser::new(ParseLimits::default())),
            io_timeout: Duration::from_secs(30),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.parser = Arc::new(HttpParser::new(limits));
        self
    }

    /// Socket read/write timeout for client connections
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stop_handle(&self) -> io::Result<StopHandle> {
        Ok(StopHandle {
            running: Arc::clone(&self.running),
            addr: self.local_addr()?,
        })
    }

    /// Accept connections until stopped.
    pub fn run(&self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "server running");

        for stream in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let parser = Arc::clone(&self.parser);
                    let io_timeout = self.io_timeout;
                    let spawned = thread::Builder::new()
                        .name("http-conn".to_string())
                        .spawn(move || handle_connection(stream, &dispatcher, &parser, io_timeout));
                    if let Err(e) = spawned {
                        error!(error = %e, "cannot spawn connection thread");
                    }
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }

        info!("server stopped");
        Ok(())
    }
}

fn handle_connection(
    mut stream: TcpStream,
    dispatcher: &Dispatcher,
    parser: &HttpParser,
    io_timeout: Duration,
) {
    let started = Instant::now();
    let client = stream
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default();

    if let Err(e) = stream
        .set_read_timeout(Some(io_timeout))
        .and_then(|_| stream.set_write_timeout(Some(io_timeout)))
    {
        warn!(client, error = %e, "cannot set socket timeouts");
    }

    let (mut response, method, path) = match parser.read_request(&mut stream, &client) {
        Ok(request) => {
            let response = dispatcher.dispatch(&request);
            (response, Some(request.method()), request.path().to_string())
        }
        Err(e) => match e.status_code() {
            Some(status) => {
                debug!(client, error = %e, "bad request");
                (error_response(status), None, "-".to_string())
            }
            None => {
                debug!(client, error = %e, "connection closed before a request arrived");
                return;
            }
        },
    };

    response.set_header("Server", crate::SERVER_SOFTWARE);
    response.set_header("Connection", "close");
    let status = response.status_code;

    let head_only = method == Some(Method::HEAD);
    let mut writer = BufWriter::new(&mut stream);
    if let Err(e) = response.write_to(&mut writer, head_only) {
        debug!(client, error = %e, "failed to write response");
    }
    drop(writer);
    let _ = stream.shutdown(Shutdown::Both);

    info!(
        client,
        method = method.map(|m| m.as_str()).unwrap_or("-"),
        path,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
}
