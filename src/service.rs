//! A small bounded worker-pool adapter exposing `Dump`/`List`/`Read` as a
//! request/response surface, per `original_source/alterator-module/src/
//! module.c`'s D-Bus method table (`dbdconf_introspection`: `Dump`/`List`/
//! `Read`, each taking `(GVDB_PATH, DIR_or_KEY)` and returning a string array
//! plus a status code) and its `handle_method_call`, which spawns a new
//! thread per incoming call. No bus crate appears anywhere in the example
//! pack, so the bus-dispatch boundary here is just a trait
//! (`RequestHandler`); the pool itself is `std::thread`/`std::sync::mpsc`,
//! since none of the examples pull in a thread-pool crate (`rayon`,
//! `threadpool`) for anything like this shape.

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, warn};

use crate::error::Error;
use crate::{parser, path as gvdb_path};

/// Maximum number of requests the pool will service concurrently.
pub const MAX_WORKERS: usize = 5;

/// One of the three bus operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Dump,
    List,
    Read,
}

/// A single `(operation, gvdb_path, path)` request.
#[derive(Debug, Clone)]
pub struct Request {
    pub operation: Operation,
    pub gvdb_path: String,
    pub path: String,
}

/// The response shape the bus expects: output lines plus a status code
/// matching the CLI's exit-code convention (0 success, -2 file error, -3
/// path-resolution error).
#[derive(Debug, Clone)]
pub struct Response {
    pub lines: Vec<String>,
    pub status: i32,
}

/// Anything that can answer a [`Request`]. The default [`FileRequestHandler`]
/// reads the GVDB file fresh on every call; a caller serving many requests
/// against the same file may want to cache the parsed tree behind its own
/// implementation of this trait instead.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: Request) -> Response;
}

/// Loads and parses `gvdb_path` on every request, then dispatches to
/// `path::dump`/`path::list`/`path::read`.
#[derive(Debug, Default)]
pub struct FileRequestHandler;

impl FileRequestHandler {
    pub fn new() -> Self {
        Self
    }
}

impl RequestHandler for FileRequestHandler {
    fn handle(&self, request: Request) -> Response {
        let file_path = Path::new(&request.gvdb_path);
        let data = match std::fs::metadata(file_path) {
            Ok(meta) if meta.is_file() => std::fs::read(file_path),
            Ok(_) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )),
            Err(err) => Err(err),
        };

        let data = match data {
            Ok(data) => data,
            Err(err) => {
                warn!("failed to read {}: {err}", request.gvdb_path);
                return Response {
                    lines: vec![format!("{}: {err}", request.gvdb_path)],
                    status: -2,
                };
            }
        };

        let root = match parser::parse_file(&data, false) {
            Ok(root) => root,
            Err(err) => {
                warn!("failed to parse {}: {err}", request.gvdb_path);
                return Response {
                    lines: vec![format!("{}: {err}", request.gvdb_path)],
                    status: -2,
                };
            }
        };

        let result = match request.operation {
            Operation::Dump => gvdb_path::dump(&root, &request.path),
            Operation::List => gvdb_path::list(&root, &request.path),
            Operation::Read => gvdb_path::read(&root, &request.path),
        };

        match result {
            Ok(text) => Response {
                lines: text.lines().map(str::to_string).collect(),
                status: 0,
            },
            Err(err @ (Error::PathSyntax(_) | Error::NotFound(_) | Error::BadType(_))) => {
                Response {
                    lines: vec![format!("{}: {err}", request.path)],
                    status: -3,
                }
            }
            Err(err) => Response {
                lines: vec![format!("{}: {err}", request.path)],
                status: -3,
            },
        }
    }
}

/// A bounded pool: at most [`MAX_WORKERS`] requests are serviced
/// concurrently, each on its own thread. Dropping the pool waits for any
/// in-flight request to finish (there is nothing left to join explicitly,
/// since each `submit` call owns its own thread handle).
pub struct Service<H: RequestHandler + 'static> {
    handler: Arc<H>,
    // Acts as a counting semaphore: a worker takes one permit from the
    // channel before running and returns it when done.
    permits: Arc<Mutex<mpsc::Receiver<()>>>,
    release: mpsc::Sender<()>,
}

impl<H: RequestHandler + 'static> Service<H> {
    pub fn new(handler: H) -> Self {
        let (release, permits) = mpsc::channel();
        for _ in 0..MAX_WORKERS {
            release.send(()).expect("receiver is held by self");
        }
        Self {
            handler: Arc::new(handler),
            permits: Arc::new(Mutex::new(permits)),
            release,
        }
    }

    /// Submit a request; blocks the calling thread only long enough to
    /// acquire a worker slot, then runs the request on a dedicated thread
    /// and waits for it to finish. This mirrors a synchronous bus call:
    /// the caller gets a `Response` back, but never more than
    /// [`MAX_WORKERS`] requests are doing file I/O at once.
    pub fn submit(&self, request: Request) -> Response {
        // Acquire a permit.
        self.permits
            .lock()
            .expect("permits mutex poisoned")
            .recv()
            .expect("release sender is held by self");

        debug!("dispatching {:?} {}", request.operation, request.gvdb_path);
        let handler = Arc::clone(&self.handler);
        let release = self.release.clone();
        let result = thread::spawn(move || {
            let response = handler.handle(request);
            release.send(()).ok();
            response
        })
        .join();

        match result {
            Ok(response) => response,
            Err(_) => Response {
                lines: vec!["worker thread panicked".to_string()],
                status: -3,
            },
        }
    }
}
