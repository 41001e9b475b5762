// std
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

pub fn bind(host: &str, port: u16) -> io::Result<TcpListener> {
    let bind_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&bind_addr)?;
    tracing::info!("TCP server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Wait for exactly one downstream connection.
pub fn accept_one(listener: &TcpListener) -> io::Result<(TcpStream, SocketAddr)> {
    tracing::info!("Waiting for incoming connection...");
    let (stream, peer) = listener.accept()?;
    stream.set_nodelay(true)?;
    tracing::info!("Connection accepted from {}", peer);
    Ok((stream, peer))
}

/// Write failures that mean the peer went away rather than a local fault.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::WriteZero
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::thread;

    #[test]
    fn test_accept_one_on_ephemeral_port() {
        let listener = bind("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).unwrap();
            buf
        });

        let (mut stream, peer) = accept_one(&listener).unwrap();
        assert!(peer.ip().is_loopback());
        assert!(stream.nodelay().unwrap());
        stream.write_all(b"hello\n").unwrap();
        drop(stream);
        assert_eq!(client.join().unwrap(), "hello\n");
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(is_disconnect(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_disconnect(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_disconnect(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
