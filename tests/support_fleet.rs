use std::ffi::OsStr;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

pub struct ServerHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a lightweight HTTP server for tests.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_http_server() -> Result<(String, ServerHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    thread::spawn(move || handle_client(stream));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}", addr),
        ServerHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
        },
    ))
}

fn handle_client(mut stream: TcpStream) {
    let mut buffer = [0u8; 1024];
    if stream.read(&mut buffer).is_err() {
        return;
    }
    if stream
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK")
        .is_err()
    {
        return;
    }
    if stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}

/// Run the `loadfleet` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_loadfleet<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = loadfleet_bin()?;
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .map_err(|err| format!("run loadfleet failed: {}", err))
}

/// A long-running `loadfleet instance` child process, killed on drop.
pub struct InstanceHandle {
    child: Child,
}

impl InstanceHandle {
    /// Wait for the instance to exit on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the process fails, exits nonzero, or outlives the
    /// timeout.
    pub fn wait_within(mut self, timeout: Duration) -> Result<(), String> {
        let deadline = Instant::now()
            .checked_add(timeout)
            .ok_or_else(|| "deadline overflow".to_owned())?;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => return Err(format!("instance exited with {}", status)),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Err("instance did not exit in time".to_owned());
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                Err(err) => return Err(format!("wait for instance failed: {}", err)),
            }
        }
    }
}

impl Drop for InstanceHandle {
    fn drop(&mut self) {
        drop(self.child.kill());
        drop(self.child.wait());
    }
}

/// Spawn one loader instance against `url` sharing the store at `db_path`.
///
/// # Errors
///
/// Returns an error if the binary cannot be spawned.
pub fn spawn_instance(db_path: &str, url: &str) -> Result<InstanceHandle, String> {
    let bin = loadfleet_bin()?;
    let child = Command::new(bin)
        .args([
            "instance",
            "--target",
            url,
            "--poll-interval",
            "50ms",
            "--store",
            db_path,
        ])
        .env("RUST_LOG", "error")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| format!("spawn instance failed: {}", err))?;
    Ok(InstanceHandle { child })
}

fn loadfleet_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_loadfleet").map_or_else(
        || Err("CARGO_BIN_EXE_loadfleet missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
