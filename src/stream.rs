//! MJPEG streaming server.
//!
//! Any TCP client that connects gets the same thing: an HTTP/1.0 response
//! whose multipart body repeats the latest encoded frame forever. There is
//! no request routing (pending request bytes are drained and ignored)
//! and no shared state between connections beyond the frame slot and the
//! FPS setting.
//!
//! Each accepted connection runs on its own worker with an independent
//! timing loop. Workers are spawned through [`ConnectionSpawner`], so a
//! bounded pool or admission limit can be slotted in later without
//! touching the protocol; the default [`ThreadPerConnection`] policy is
//! unbounded, which is a known resource-exhaustion risk accepted for now.

use std::io::{BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

use anyhow::{Context, Result};

use crate::framebuf::FrameBuffer;
use crate::pipeline::period_for_fps;
use crate::store::TuningStore;

/// Fixed multipart boundary token, shared by all connections.
pub const BOUNDARY: &str = "targetframe";

/// Worker-spawn policy for accepted connections.
pub trait ConnectionSpawner: Send + Sync {
    fn spawn(&self, name: String, work: Box<dyn FnOnce() + Send>) -> Result<()>;
}

/// One OS thread per connection, no cap.
pub struct ThreadPerConnection;

impl ConnectionSpawner for ThreadPerConnection {
    fn spawn(&self, name: String, work: Box<dyn FnOnce() + Send>) -> Result<()> {
        thread::Builder::new()
            .name(name)
            .spawn(work)
            .context("spawn stream connection worker")?;
        Ok(())
    }
}

pub struct StreamServer {
    listener: TcpListener,
    backlog: u32,
    store: TuningStore,
    frames: FrameBuffer,
    spawner: Box<dyn ConnectionSpawner>,
}

impl StreamServer {
    /// Bind the listening socket. Port 0 picks an ephemeral port.
    ///
    /// The requested backlog is recorded for the startup log line; the
    /// standard listener applies the OS default.
    pub fn bind(port: u16, backlog: u32, store: TuningStore, frames: FrameBuffer) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .with_context(|| format!("bind stream server on port {port}"))?;
        Ok(Self {
            listener,
            backlog,
            store,
            frames,
            spawner: Box::new(ThreadPerConnection),
        })
    }

    pub fn with_spawner(mut self, spawner: Box<dyn ConnectionSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails. A listener failure is
    /// fatal to streaming only; connection failures never reach here.
    pub fn serve(self) -> Result<()> {
        log::info!(
            "stream server listening on {} (requested backlog {})",
            self.listener.local_addr()?,
            self.backlog
        );
        let mut number = 0u64;
        loop {
            let (socket, peer) = self
                .listener
                .accept()
                .context("accept stream connection")?;
            log::info!("new stream connection from {peer}");

            let store = self.store.clone();
            let frames = self.frames.clone();
            self.spawner.spawn(
                format!("streamer-{number}"),
                Box::new(move || {
                    // Peer disconnects surface as write errors; that is
                    // the normal way a stream ends.
                    if let Err(err) = stream_to_client(socket, store, frames) {
                        log::info!("stream connection from {peer} closed: {err:#}");
                    }
                }),
            )?;
            number += 1;
        }
    }

    /// Bind and serve in one call.
    pub fn listen(
        port: u16,
        backlog: u32,
        store: TuningStore,
        frames: FrameBuffer,
    ) -> Result<()> {
        Self::bind(port, backlog, store, frames)?.serve()
    }
}

/// Per-connection loop: drain the request, send the multipart header, then
/// repeat the latest frame at the configured rate until the peer goes
/// away.
fn stream_to_client(socket: TcpStream, store: TuningStore, frames: FrameBuffer) -> Result<()> {
    drain_pending_input(&socket)?;
    socket.set_nodelay(true).ok();
    let mut out = BufWriter::new(socket);

    let header = format!(
        "HTTP/1.0 200 OK\r\n\
         Connection: close\r\n\
         Cache-Control: no-cache\r\n\
         Pragma: no-cache\r\n\
         Content-type: multipart/x-mixed-replace; boundary=--{BOUNDARY}\r\n\
         \r\n"
    );
    out.write_all(header.as_bytes())?;

    loop {
        // A snapshot may be empty before the first successful cycle; a
        // zero-length part is still a well-formed part.
        let frame = frames.snapshot();
        let part_header = format!(
            "--{BOUNDARY}\r\n\
             Content-type: image/jpeg\r\n\
             Content-Length: {}\r\n\
             \r\n",
            frame.len()
        );
        out.write_all(part_header.as_bytes())?;
        out.write_all(&frame)?;
        out.write_all(b"\r\n")?;
        out.flush()?;

        // Re-read FPS every iteration so a live tuning change takes
        // effect on the very next frame sent to this connection.
        thread::sleep(period_for_fps(store.fps()));
    }
}

/// Consume whatever request bytes are already pending, without parsing
/// them. Every connection gets the same stream regardless of what it
/// asked for.
fn drain_pending_input(socket: &TcpStream) -> Result<()> {
    socket.set_nonblocking(true)?;
    let mut scratch = [0u8; 1024];
    loop {
        match (&*socket).read(&mut scratch) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(err) => {
                socket.set_nonblocking(false).ok();
                return Err(err).context("drain stream request");
            }
        }
    }
    socket.set_nonblocking(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::io::BufReader;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn start_server(store: TuningStore, frames: FrameBuffer) -> SocketAddr {
        let server = StreamServer::bind(0, 150, store, frames).unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || {
            let _ = server.serve();
        });
        addr
    }

    fn read_one_part(reader: &mut BufReader<TcpStream>) -> Vec<u8> {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim_end(), format!("--{BOUNDARY}"));

        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim_end(), "Content-type: image/jpeg");

        line.clear();
        reader.read_line(&mut line).unwrap();
        let length: usize = line
            .trim_end()
            .strip_prefix("Content-Length: ")
            .unwrap()
            .parse()
            .unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "\r\n");

        let mut body = vec![0u8; length + 2];
        reader.read_exact(&mut body).unwrap();
        assert_eq!(&body[length..], b"\r\n");
        body.truncate(length);
        body
    }

    fn read_response_header(reader: &mut BufReader<TcpStream>) -> Vec<String> {
        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" {
                break;
            }
            headers.push(line.trim_end().to_string());
        }
        headers
    }

    #[test]
    fn client_receives_multipart_header_and_frames() {
        let store = TuningStore::new();
        store.set_fps(100);
        let frames = FrameBuffer::new();
        frames.publish(vec![0xFF, 0xD8, 0x01, 0x02]);
        let addr = start_server(store, frames);

        let mut client = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        client.write_all(b"GET /stream HTTP/1.0\r\n\r\n").unwrap();
        let mut reader = BufReader::new(client);

        let headers = read_response_header(&mut reader);
        assert_eq!(headers[0], "HTTP/1.0 200 OK");
        assert!(headers.contains(&"Connection: close".to_string()));
        assert!(headers.contains(&"Cache-Control: no-cache".to_string()));
        assert!(headers.contains(&"Pragma: no-cache".to_string()));
        assert!(headers.contains(&format!(
            "Content-type: multipart/x-mixed-replace; boundary=--{BOUNDARY}"
        )));

        for _ in 0..3 {
            let body = read_one_part(&mut reader);
            assert_eq!(body, vec![0xFF, 0xD8, 0x01, 0x02]);
        }
    }

    #[test]
    fn empty_frame_slot_yields_zero_length_parts() {
        let store = TuningStore::new();
        store.set_fps(100);
        let addr = start_server(store, FrameBuffer::new());

        let client = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        let mut reader = BufReader::new(client);
        read_response_header(&mut reader);
        let body = read_one_part(&mut reader);
        assert!(body.is_empty());
    }

    #[test]
    fn one_dropped_client_does_not_disturb_the_rest() {
        let store = TuningStore::new();
        store.set_fps(100);
        let frames = FrameBuffer::new();
        frames.publish(vec![0xAB; 64]);
        let addr = start_server(store, frames);

        let survivor = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        let doomed = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        drop(doomed);

        let mut reader = BufReader::new(survivor);
        read_response_header(&mut reader);
        for _ in 0..5 {
            let body = read_one_part(&mut reader);
            assert_eq!(body.len(), 64);
            assert!(body.iter().all(|&b| b == 0xAB));
        }
    }

    #[test]
    fn connections_spawn_through_the_policy_interface() {
        struct CountingSpawner(Arc<AtomicUsize>);
        impl ConnectionSpawner for CountingSpawner {
            fn spawn(&self, name: String, work: Box<dyn FnOnce() + Send>) -> Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                ThreadPerConnection.spawn(name, work)
            }
        }

        let spawned = Arc::new(AtomicUsize::new(0));
        let store = TuningStore::new();
        store.set_fps(100);
        let server = StreamServer::bind(0, 150, store, FrameBuffer::new())
            .unwrap()
            .with_spawner(Box::new(CountingSpawner(spawned.clone())));
        let addr = server.local_addr().unwrap();
        thread::spawn(move || {
            let _ = server.serve();
        });

        let a = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        let b = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        let mut reader = BufReader::new(a);
        read_response_header(&mut reader);
        let mut reader = BufReader::new(b);
        read_response_header(&mut reader);
        assert_eq!(spawned.load(Ordering::SeqCst), 2);
    }
}
