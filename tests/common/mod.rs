#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flate2::Compression;
use flate2::write::GzEncoder;

use figmirror::blob::{BlobStore, StoreFactory};
use figmirror::error::MirrorError;

/// In-memory stand-in for the blob container, shared by every handle a
/// factory produces so tests can inspect the final state.
#[derive(Default)]
pub struct SharedStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    put_budget: Mutex<Option<usize>>,
}

impl SharedStore {
    pub fn seed(&self, key: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_vec());
    }

    /// Allow `budget` more successful uploads, then fail every put.
    pub fn fail_puts_after(&self, budget: usize) {
        *self.put_budget.lock().unwrap() = Some(budget);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

pub struct MemoryStore(Arc<SharedStore>);

impl BlobStore for MemoryStore {
    fn exists_with_prefix(&self, prefix: &str) -> Result<bool, MirrorError> {
        Ok(self
            .0
            .objects
            .lock()
            .unwrap()
            .keys()
            .any(|key| key.starts_with(prefix)))
    }

    fn put_file(&self, key: &str, source: &Path) -> Result<(), MirrorError> {
        let mut budget = self.0.put_budget.lock().unwrap();
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                return Err(MirrorError::Storage("simulated upload failure".to_string()));
            }
            *remaining -= 1;
        }
        drop(budget);

        let content =
            std::fs::read(source).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        self.0
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content);
        Ok(())
    }
}

pub struct MemoryFactory(pub Arc<SharedStore>);

impl StoreFactory for MemoryFactory {
    fn connect(&self) -> Result<Box<dyn BlobStore>, MirrorError> {
        Ok(Box::new(MemoryStore(self.0.clone())))
    }
}

/// A factory whose connections always fail, for exercising the pipeline's
/// failure boundary.
pub struct BrokenFactory;

impl StoreFactory for BrokenFactory {
    fn connect(&self) -> Result<Box<dyn BlobStore>, MirrorError> {
        Err(MirrorError::Storage("connection refused".to_string()))
    }
}

/// Scripted behavior for one incoming HTTP request.
#[derive(Clone)]
pub enum Scripted {
    Ok(Vec<u8>),
    Error500,
    /// Declare a full body but close the socket early.
    Truncated(Vec<u8>),
}

/// Minimal loopback HTTP server. Responses are consumed in order; once the
/// script runs out the last entry repeats forever.
pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn start(script: Vec<Scripted>) -> Self {
        assert!(!script.is_empty(), "test server needs at least one response");
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let thread_hits = hits.clone();
        std::thread::spawn(move || {
            let mut queue: VecDeque<Scripted> = script.into();
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                thread_hits.fetch_add(1, Ordering::SeqCst);
                let response = if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().unwrap().clone()
                };
                respond(stream, response);
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn respond(mut stream: TcpStream, response: Scripted) {
    // Drain the request head before answering.
    let mut buffer = [0u8; 1024];
    let mut head = Vec::new();
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                head.extend_from_slice(&buffer[..n]);
                if head.windows(4).any(|window| window == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => return,
        }
    }

    match response {
        Scripted::Ok(body) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
        }
        Scripted::Error500 => {
            let _ = stream.write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
        Scripted::Truncated(body) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body[..body.len() / 2]);
            // Dropping the stream here cuts the transfer short.
        }
    }
}

/// Build a `.tar.gz` archive at `path` from `(entry_name, content)` pairs.
pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Same pairs, rendered to an in-memory `.tar.gz` byte buffer.
pub fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
