//! WHOIS wire framing: size-capped reads under a deadline and CRLF
//! terminated writes.

use crate::errors::ProxyError;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

pub const CRLF: &[u8] = b"\r\n";

const READ_CHUNK_SIZE: usize = 256;

/// Where a framed read stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Stop once the received bytes end in `\r\n` (client requests).
    Crlf,
    /// Read until the peer closes the stream (upstream responses).
    Eof,
}

/// Read one frame of at most `max_len` bytes within `deadline`.
///
/// End of stream always ends the frame and is not an error. Going over
/// `max_len` fails with [`ProxyError::BufferOverflow`].
pub async fn read_frame<R>(
    reader: &mut R,
    framing: Framing,
    max_len: usize,
    deadline: Duration,
) -> Result<Vec<u8>, ProxyError>
where
    R: AsyncRead + Unpin,
{
    timeout(deadline, read_until(reader, framing, max_len)).await?
}

async fn read_until<R>(
    reader: &mut R,
    framing: Framing,
    max_len: usize,
) -> Result<Vec<u8>, ProxyError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(max_len.min(4096));
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }

        // flood protection
        if buf.len() + n > max_len {
            return Err(ProxyError::BufferOverflow { limit: max_len });
        }
        buf.extend_from_slice(&chunk[..n]);

        if framing == Framing::Crlf && buf.ends_with(CRLF) {
            break;
        }
    }

    Ok(buf)
}

/// Write `payload` followed by `\r\n` within `deadline`.
pub async fn write_line<W>(
    writer: &mut W,
    payload: &str,
    deadline: Duration,
) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    timeout(deadline, async {
        let mut line = Vec::with_capacity(payload.len() + CRLF.len());
        line.extend_from_slice(payload.as_bytes());
        line.extend_from_slice(CRLF);
        writer.write_all(&line).await?;
        writer.flush().await
    })
    .await??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const DEADLINE: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_read_stops_at_crlf() {
        let mut mock = Builder::new().read(b"exam").read(b"ple.com\r\n").build();
        let frame = read_frame(&mut mock, Framing::Crlf, 4096, DEADLINE).await.unwrap();
        assert_eq!(frame, b"example.com\r\n");
    }

    #[tokio::test]
    async fn test_read_crlf_split_across_chunks() {
        let mut mock = Builder::new().read(b"example.com\r").read(b"\n").build();
        let frame = read_frame(&mut mock, Framing::Crlf, 4096, DEADLINE).await.unwrap();
        assert_eq!(frame, b"example.com\r\n");
    }

    #[tokio::test]
    async fn test_read_eof_is_not_an_error() {
        let mut mock = Builder::new().read(b"example.com").build();
        let frame = read_frame(&mut mock, Framing::Crlf, 4096, DEADLINE).await.unwrap();
        assert_eq!(frame, b"example.com");

        let mut mock = Builder::new().build();
        let frame = read_frame(&mut mock, Framing::Crlf, 4096, DEADLINE).await.unwrap();
        assert!(frame.is_empty());
    }

    #[tokio::test]
    async fn test_read_eof_framing_ignores_crlf() {
        let mut mock = Builder::new()
            .read(b"domain: EXAMPLE.RU\r\n")
            .read(b"source: TCI\r\n")
            .build();
        let frame = read_frame(&mut mock, Framing::Eof, 4096, DEADLINE).await.unwrap();
        assert_eq!(frame, b"domain: EXAMPLE.RU\r\nsource: TCI\r\n");
    }

    #[tokio::test]
    async fn test_read_overflow() {
        let mut mock = Builder::new().read(b"0123456789").read(b"0123456789").build();
        let err = read_frame(&mut mock, Framing::Crlf, 16, DEADLINE).await.unwrap_err();
        assert!(matches!(err, ProxyError::BufferOverflow { limit: 16 }));
    }

    #[tokio::test]
    async fn test_read_exactly_at_limit() {
        let mut mock = Builder::new().read(b"0123456789abcd\r\n").build();
        let frame = read_frame(&mut mock, Framing::Crlf, 16, DEADLINE).await.unwrap();
        assert_eq!(frame.len(), 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let mut mock = Builder::new()
            .read(b"exam")
            .wait(Duration::from_secs(10))
            .build();
        let err = read_frame(&mut mock, Framing::Crlf, 4096, DEADLINE).await.unwrap_err();
        assert!(matches!(err, ProxyError::Timeout));
    }

    #[tokio::test]
    async fn test_read_error() {
        let mut mock = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let err = read_frame(&mut mock, Framing::Crlf, 4096, DEADLINE).await.unwrap_err();
        assert!(matches!(err, ProxyError::Io(_)));
    }

    #[tokio::test]
    async fn test_write_line_appends_crlf() {
        let mut mock = Builder::new().write(b"empty request\r\n").build();
        write_line(&mut mock, "empty request", DEADLINE).await.unwrap();
    }
}
