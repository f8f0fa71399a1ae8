#![allow(dead_code)]

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use ocsp_agent::ocsp::{BasicResponseBuilder, DigestAlgorithm, OcspRequest};
use ocsp_agent::pki::Certificate;
use ocsp_agent::telemetry;
use ocsp_agent::tls::{AccessLocations, generate_ca_certificate, generate_leaf_certificate};
use openssl::pkey::{PKey, Private};
use openssl::ssl::{Ssl, SslAcceptor};
use openssl::x509::X509;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_openssl::SslStream;

pub const GREETING: &[u8] = b"hello";

/// A CA and a leaf it issued.
pub struct Pki {
    pub ca_cert: X509,
    pub ca_key: PKey<Private>,
    pub leaf_cert: X509,
    pub leaf_key: PKey<Private>,
}

impl Pki {
    pub fn new(locations: &AccessLocations) -> Self {
        let (ca_cert, ca_key) = generate_ca_certificate().unwrap();
        let (leaf_cert, leaf_key) =
            generate_leaf_certificate(&ca_cert, &ca_key, locations).unwrap();
        Self {
            ca_cert,
            ca_key,
            leaf_cert,
            leaf_key,
        }
    }

    pub fn leaf(&self) -> Certificate {
        Certificate::from_der(self.leaf_cert.to_der().unwrap()).unwrap()
    }

    pub fn issuer(&self) -> Certificate {
        Certificate::from_der(self.ca_cert.to_der().unwrap()).unwrap()
    }

    pub fn request(&self) -> OcspRequest {
        OcspRequest::generate(self.leaf(), self.issuer()).unwrap()
    }

    /// A response about the leaf, signed by the CA.
    pub fn response(
        &self,
        customize: impl FnOnce(BasicResponseBuilder) -> BasicResponseBuilder,
    ) -> Vec<u8> {
        customize(BasicResponseBuilder::new(self.request().cert_id))
            .sign(&self.ca_key, DigestAlgorithm::Sha256)
            .unwrap()
    }

    /// Leaf followed by the CA, PEM encoded.
    pub fn chain_pem(&self) -> Vec<u8> {
        let mut chain = self.leaf_cert.to_pem().unwrap();
        chain.extend_from_slice(&self.ca_cert.to_pem().unwrap());
        chain
    }

    pub fn leaf_key_pem(&self) -> Vec<u8> {
        self.leaf_key.private_key_to_pem_pkcs8().unwrap()
    }
}

pub async fn spawn_http(router: Router) -> String {
    telemetry::init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("failed to run server");
    });
    format!("http://{addr}")
}

/// OCSP responder answering every POST with the configured bytes.
pub struct Responder {
    pub hits: AtomicUsize,
    status: AtomicU16,
    response: Mutex<Vec<u8>>,
    content_type: Mutex<Option<String>>,
}

impl Responder {
    pub fn set_response(&self, response: Vec<u8>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_content_type(&self) -> Option<String> {
        self.content_type.lock().unwrap().clone()
    }
}

pub async fn spawn_responder() -> (String, Arc<Responder>) {
    let responder = Arc::new(Responder {
        hits: AtomicUsize::new(0),
        status: AtomicU16::new(200),
        response: Mutex::new(Vec::new()),
        content_type: Mutex::new(None),
    });
    let router = Router::new()
        .route("/", post(respond))
        .with_state(responder.clone());
    (format!("{}/", spawn_http(router).await), responder)
}

async fn respond(
    State(responder): State<Arc<Responder>>,
    headers: HeaderMap,
    _body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], Vec<u8>) {
    responder.hits.fetch_add(1, Ordering::SeqCst);
    *responder.content_type.lock().unwrap() = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let status = StatusCode::from_u16(responder.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = responder.response.lock().unwrap().clone();
    (
        status,
        [(header::CONTENT_TYPE, "application/ocsp-response")],
        body,
    )
}

/// Serves DER certificates under `/{name}` and counts requests per name.
#[derive(Default)]
pub struct AiaServer {
    certs: Mutex<HashMap<String, Vec<u8>>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl AiaServer {
    pub fn publish(&self, name: &str, der: Vec<u8>) {
        self.certs.lock().unwrap().insert(name.to_string(), der);
    }

    pub fn hits(&self, name: &str) -> usize {
        self.hits.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

pub async fn spawn_aia() -> (String, Arc<AiaServer>) {
    let aia = Arc::new(AiaServer::default());
    let router = Router::new()
        .route("/{name}", get(serve_certificate))
        .with_state(aia.clone());
    (spawn_http(router).await, aia)
}

async fn serve_certificate(
    State(aia): State<Arc<AiaServer>>,
    Path(name): Path<String>,
) -> (StatusCode, Vec<u8>) {
    *aia.hits.lock().unwrap().entry(name.clone()).or_default() += 1;
    match aia.certs.lock().unwrap().get(&name) {
        Some(der) => (StatusCode::OK, der.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

/// TLS server greeting every client that completes the handshake.
pub async fn spawn_tls_server(acceptor: SslAcceptor) -> u16 {
    telemetry::init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let ssl = Ssl::new(acceptor.context()).unwrap();
            let mut stream = SslStream::new(ssl, tcp).unwrap();
            tokio::spawn(async move {
                if Pin::new(&mut stream).accept().await.is_ok() {
                    let _ = stream.write_all(GREETING).await;
                    let _ = stream.shutdown().await;
                }
            });
        }
    });
    port
}
