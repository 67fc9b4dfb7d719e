//! Minimal protocol client.
//!
//! Speaks the same framing as the server; used by integration tests and
//! handy for poking a running server by hand.

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::connection::{self, MessageReader, MessageWriter};
use crate::error::{ProtocolError, SessionError};
use crate::message::{Direction, Message};
use crate::session::{AUTH_ACCEPTED, AUTH_REJECTED, AUTH_REQUEST};

pub struct GameClient {
    reader: MessageReader<ReadHalf<TcpStream>>,
    writer: MessageWriter<WriteHalf<TcpStream>>,
    frames: u64,
}

impl GameClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = connection::split(stream);
        Ok(Self {
            reader,
            writer,
            frames: 0,
        })
    }

    /// Answer the server's credential request. `Ok(true)` when accepted.
    pub async fn login(&mut self, name: &str, secret: &str) -> Result<bool, SessionError> {
        match self.next_message().await? {
            Some(Message::Auth { step, .. }) if step == AUTH_REQUEST => {}
            _ => return Err(ProtocolError::Malformed("expected credential request").into()),
        }
        self.writer.send(Message::auth(name, secret)).await?;

        match self.next_message().await? {
            Some(Message::Auth { step, .. }) if step == AUTH_ACCEPTED => Ok(true),
            Some(Message::Auth { step, .. }) if step == AUTH_REJECTED => Ok(false),
            None => Err(SessionError::UnexpectedEof),
            Some(_) => Err(ProtocolError::Malformed("expected credential verdict").into()),
        }
    }

    pub async fn send_command(&self, direction: Direction) -> Result<(), ProtocolError> {
        self.writer.send(Message::command(direction)).await
    }

    pub async fn send(&self, message: Message) -> Result<(), ProtocolError> {
        self.writer.send(message).await
    }

    /// Next message of any kind, frames included.
    pub async fn recv(&mut self) -> Result<Option<Message>, SessionError> {
        let message = self.reader.recv().await?;
        if let Some(Message::Frame(_)) = message {
            self.frames += 1;
        }
        Ok(message)
    }

    /// Next message that is not a video frame.
    pub async fn next_message(&mut self) -> Result<Option<Message>, SessionError> {
        loop {
            match self.recv().await? {
                Some(Message::Frame(_)) => continue,
                other => return Ok(other),
            }
        }
    }

    /// Video frames received so far.
    pub fn frames_seen(&self) -> u64 {
        self.frames
    }

    pub async fn close(&self) -> Result<(), ProtocolError> {
        self.writer.close().await
    }
}
