//! Turmoil-backed TCP transport.
//!
//! Each party listens on one port and opens one outgoing stream per peer on
//! first use. Every stream starts with a `Hello` frame naming the opener;
//! the receiver attributes everything that follows on that stream to it.
//!
//! ```text
//! send(Bob, ann) ──► [Hello{Alice}] [Announce] [Announce] ... ──► Bob:PORT
//!                                                               │
//!                                            reader task ◄──────┘
//!                                                 │
//!                                       inbox (mpsc) ──► recv()
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    time::Duration,
};

use async_trait::async_trait;
use bytes::BytesMut;
use ghzss_core::{Transport, TransportError};
use ghzss_proto::{BasisAnnouncement, Frame, FrameHeader, Hello, PartyId};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    sync::mpsc,
};
use turmoil::net::{TcpListener, TcpStream};

type Envelope = (PartyId, BasisAnnouncement);
type Inbox = mpsc::UnboundedSender<Result<Envelope, TransportError>>;

/// Connection attempts before a peer counts as unreachable.
const CONNECT_ATTEMPTS: u32 = 50;

/// Pause between connection attempts.
const CONNECT_RETRY: Duration = Duration::from_millis(10);

/// One party's TCP endpoint inside a turmoil simulation.
pub struct SimTransport {
    me: PartyId,
    port: u16,
    known: BTreeSet<PartyId>,
    streams: BTreeMap<PartyId, TcpStream>,
    inbox: mpsc::UnboundedReceiver<Result<Envelope, TransportError>>,
    sent: u64,
}

impl SimTransport {
    /// Listen on `port` and start accepting streams.
    ///
    /// Must run inside a turmoil host. Every peer is expected to listen on
    /// the same port under its own host name.
    pub async fn bind(
        me: PartyId,
        port: u16,
        peers: impl IntoIterator<Item = PartyId>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(format!("0.0.0.0:{port}").as_str()).await?;
        let (tx, inbox) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(listener, tx));

        let known = peers.into_iter().filter(|p| *p != me).collect();
        tracing::debug!(party = %me, port, "listening");

        Ok(Self { me, port, known, streams: BTreeMap::new(), inbox, sent: 0 })
    }

    /// Owning party.
    pub fn party(&self) -> &PartyId {
        &self.me
    }

    /// Announcements sent through this endpoint.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    async fn stream_to(&mut self, peer: &PartyId) -> Result<&mut TcpStream, TransportError> {
        if !self.known.contains(peer) {
            return Err(TransportError::UnknownPeer(peer.clone()));
        }

        if !self.streams.contains_key(peer) {
            let mut stream = self.connect(peer).await?;
            let hello = Frame::hello(&Hello { sender: self.me.clone() })?;
            stream.write_all(&hello.to_bytes()).await?;
            self.streams.insert(peer.clone(), stream);
        }

        self.streams.get_mut(peer).ok_or_else(|| TransportError::UnknownPeer(peer.clone()))
    }

    async fn connect(&self, peer: &PartyId) -> Result<TcpStream, TransportError> {
        let addr = format!("{peer}:{}", self.port);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpStream::connect(addr.as_str()).await {
                Ok(stream) => {
                    tracing::debug!(party = %self.me, %peer, attempt, "connected");
                    return Ok(stream);
                },
                Err(err) if attempt < CONNECT_ATTEMPTS => {
                    tracing::trace!(party = %self.me, %peer, attempt, error = %err, "connect failed");
                    tokio::time::sleep(CONNECT_RETRY).await;
                },
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn send(
        &mut self,
        to: &PartyId,
        announcement: BasisAnnouncement,
    ) -> Result<(), TransportError> {
        let frame = Frame::announce(&announcement)?;
        let stream = self.stream_to(to).await?;
        stream.write_all(&frame.to_bytes()).await?;
        self.sent += 1;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Envelope, TransportError> {
        match self.inbox.recv().await {
            Some(delivery) => delivery,
            None => Err(TransportError::Closed(format!("listener of {} closed", self.me))),
        }
    }
}

async fn accept_loop(listener: TcpListener, inbox: Inbox) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::trace!(%addr, "accepted");
                tokio::spawn(read_stream(stream, inbox.clone()));
            },
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                return;
            },
        }
    }
}

async fn read_stream(mut stream: TcpStream, inbox: Inbox) {
    let sender = match read_hello(&mut stream).await {
        Ok(Some(sender)) => sender,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(error = %err, "dropping stream without valid hello");
            return;
        },
    };

    loop {
        let delivery = match read_frame(&mut stream).await {
            Ok(Some(frame)) => frame
                .announcement()
                .map(|announcement| (sender.clone(), announcement))
                .map_err(TransportError::from),
            Ok(None) => return,
            Err(err) => Err(err),
        };

        let failed = delivery.is_err();
        if inbox.send(delivery).is_err() || failed {
            return;
        }
    }
}

async fn read_hello(stream: &mut TcpStream) -> Result<Option<PartyId>, TransportError> {
    let Some(frame) = read_frame(stream).await? else {
        return Ok(None);
    };
    Ok(Some(frame.hello_payload()?.sender))
}

/// Read one frame. `None` on a clean end of stream between frames.
async fn read_frame(
    reader: &mut (impl AsyncRead + Unpin),
) -> Result<Option<Frame>, TransportError> {
    let mut buf = BytesMut::zeroed(FrameHeader::SIZE);
    match reader.read_exact(&mut buf).await {
        Ok(_) => {},
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let header = FrameHeader::from_bytes(&buf)?;
    buf.resize(FrameHeader::SIZE + header.payload_size(), 0);
    reader.read_exact(&mut buf[FrameHeader::SIZE..]).await?;

    Ok(Some(Frame::decode(&buf)?))
}

#[cfg(test)]
mod tests {
    use ghzss_proto::Basis;

    use super::*;

    #[tokio::test]
    async fn frames_are_read_back_in_order() {
        let hello = Frame::hello(&Hello { sender: PartyId::new("Bob") }).unwrap();
        let first = Frame::announce(&BasisAnnouncement::own(3, PartyId::new("Bob"), Basis::Y)).unwrap();
        let second = Frame::announce(&BasisAnnouncement::own(4, PartyId::new("Bob"), Basis::X)).unwrap();

        let mut wire = BytesMut::new();
        for frame in [&hello, &first, &second] {
            frame.encode(&mut wire);
        }
        let mut reader = &wire[..];

        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(hello));
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(first));
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(second));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_payload_is_an_error() {
        let frame = Frame::announce(&BasisAnnouncement::own(0, PartyId::new("Bob"), Basis::X)).unwrap();
        let bytes = frame.to_bytes();
        let mut reader = &bytes[..bytes.len() - 1];

        assert!(matches!(read_frame(&mut reader).await, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn garbage_header_is_a_decode_error() {
        let garbage = [0xAB_u8; FrameHeader::SIZE];
        let mut reader = &garbage[..];

        assert!(matches!(read_frame(&mut reader).await, Err(TransportError::Decode(_))));
    }
}
