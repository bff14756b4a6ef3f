//! Newline-delimited JSON message host.

use crate::app::Services;
use crate::handlers;
use crate::protocol::{Reply, Request, Response};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Serve requests from `reader` until EOF, writing one response per request.
///
/// Requests are handled in order. A malformed line gets an error response and
/// the loop continues.
pub async fn serve<R, W>(services: &Services, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut handled = 0u64;

    info!("Message host started");

    loop {
        buf.clear();
        let bytes_read = reader.read_until(b'\n', &mut buf).await?;

        if bytes_read == 0 {
            debug!("Input closed");
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                respond(services, trimmed).await
            }
            Err(e) => {
                warn!(error = %e, "Rejected non-UTF-8 request line");
                Response::new(None, Reply::error(format!("Parse error: {}", e)))
            }
        };

        let response_json = response.to_json()?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        handled += 1;
    }

    info!(handled, "Message host stopped");
    Ok(())
}

async fn respond(services: &Services, line: &str) -> Response {
    match Request::parse(line) {
        Ok(request) => {
            debug!(id = ?request.id, "Received request");
            let reply = handlers::handle(services, request.action).await;
            Response::new(request.id, reply)
        }
        Err((id, message)) => {
            warn!(id = ?id, error = %message, "Rejected request");
            Response::new(id, Reply::error(message))
        }
    }
}
