//! Length-prefixed tag framing over TCP.
//!
//! Every frame is a 4-byte big-endian length followed by the body. The body
//! is the encoded tag, or `nonce || ciphertext` once a session cipher has
//! been installed. Decoding happens on the dispatch side so a cipher
//! installed after a reply applies to exactly the frames that follow it.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use parley_shared::crypto::{self, SessionSecret, SymmetricKey};
use parley_shared::Tag;
use tracing::{debug, trace};

use crate::error::TransportError;

/// The connection a session talks through.
pub trait Transport: Send {
    fn send(&mut self, tag: &Tag) -> Result<(), TransportError>;

    /// Decode one received frame body into a tag.
    fn open(&self, frame: &[u8]) -> Result<Tag, TransportError>;

    /// Encrypt everything from here on with a key derived from `secret`.
    fn install_cipher(&mut self, secret: &SessionSecret);

    fn close(&mut self);
}

pub fn write_frame<W: Write>(writer: &mut W, body: &[u8], max: usize) -> Result<(), TransportError> {
    if body.len() > max {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            max,
        });
    }
    let len = body.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame body. `None` on a clean end of stream between frames.
pub fn read_frame<R: Read>(reader: &mut R, max: usize) -> Result<Option<Vec<u8>>, TransportError> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > max {
        return Err(TransportError::FrameTooLarge { size: len, max });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Framed transport over a TCP stream with an optional session cipher.
pub struct FramedTransport {
    stream: TcpStream,
    cipher: Option<SymmetricKey>,
    max_frame_size: usize,
}

impl FramedTransport {
    pub fn new(stream: TcpStream, max_frame_size: usize) -> Self {
        Self {
            stream,
            cipher: None,
            max_frame_size,
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// A second handle on the stream that only reads raw frames, for a
    /// dedicated reader thread.
    pub fn reader(&self) -> io::Result<FrameReader> {
        Ok(FrameReader {
            stream: self.stream.try_clone()?,
            max_frame_size: self.max_frame_size,
        })
    }

    /// Blocking receive of the next tag on this handle.
    pub fn recv(&mut self) -> Result<Option<Tag>, TransportError> {
        match read_frame(&mut self.stream, self.max_frame_size)? {
            Some(frame) => self.open(&frame).map(Some),
            None => Ok(None),
        }
    }
}

impl Transport for FramedTransport {
    fn send(&mut self, tag: &Tag) -> Result<(), TransportError> {
        trace!(tag = %tag, post = tag.post().len(), "Sending frame");
        match &self.cipher {
            Some(key) => {
                let sealed = crypto::encrypt(key, tag.encoded())?;
                write_frame(&mut self.stream, &sealed, self.max_frame_size)
            }
            None => write_frame(&mut self.stream, tag.encoded(), self.max_frame_size),
        }
    }

    fn open(&self, frame: &[u8]) -> Result<Tag, TransportError> {
        let tag = match &self.cipher {
            Some(key) => Tag::parse(&crypto::decrypt(key, frame)?)?,
            None => Tag::parse(frame)?,
        };
        Ok(tag)
    }

    fn install_cipher(&mut self, secret: &SessionSecret) {
        self.cipher = Some(crypto::derive_session_key(secret));
        debug!("Session cipher installed");
    }

    fn close(&mut self) {
        // Already-closed sockets report NotConnected; nothing left to do.
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Read half handed to the reader thread.
pub struct FrameReader {
    stream: TcpStream,
    max_frame_size: usize,
}

impl FrameReader {
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        read_frame(&mut self.stream, self.max_frame_size)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::TcpListener;

    use parley_shared::crypto::generate_session_secret;

    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"<m>hi", 64).unwrap();
        write_frame(&mut wire, b"", 64).unwrap();
        assert_eq!(&wire[..4], &[0, 0, 0, 5]);

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor, 64).unwrap().unwrap(), b"<m>hi");
        assert_eq!(read_frame(&mut cursor, 64).unwrap().unwrap(), b"");
        assert!(read_frame(&mut cursor, 64).unwrap().is_none());
    }

    #[test]
    fn test_oversized_frames_rejected() {
        let mut wire = Vec::new();
        assert!(matches!(
            write_frame(&mut wire, &[0u8; 65], 64),
            Err(TransportError::FrameTooLarge { size: 65, max: 64 })
        ));

        let mut cursor = Cursor::new(1000u32.to_be_bytes().to_vec());
        assert!(matches!(
            read_frame(&mut cursor, 64),
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 9, b'<', b'm']);
        assert!(matches!(read_frame(&mut cursor, 64), Err(TransportError::Io(_))));
    }

    fn pair() -> (FramedTransport, FramedTransport) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (
            FramedTransport::new(server, 1 << 16),
            FramedTransport::new(client, 1 << 16),
        )
    }

    #[test]
    fn test_plain_and_encrypted_exchange() {
        let (mut server, mut client) = pair();

        let hello = Tag::new("m").with_attr("k", "v").with_post("plain");
        client.send(&hello).unwrap();
        assert_eq!(server.recv().unwrap().unwrap(), hello);

        let secret = generate_session_secret();
        server.install_cipher(&secret);
        client.install_cipher(&secret);
        assert!(server.is_encrypted());

        let secret_msg = Tag::new("m").with_post(vec![0u8, 1, 2, 255]);
        client.send(&secret_msg).unwrap();

        let mut reader = server.reader().unwrap();
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.len(), secret_msg.encoded_len() + 24 + 16);
        assert_eq!(server.open(&frame).unwrap(), secret_msg);
    }

    #[test]
    fn test_close_ends_peer_stream() {
        let (mut server, mut client) = pair();
        server.close();
        server.close();
        assert!(client.recv().unwrap().is_none());
    }
}
