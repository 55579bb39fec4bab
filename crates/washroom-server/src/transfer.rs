//! File transfers with the selected peer.
//!
//! Uploads announce `UPLOAD <name> <size>` and stream the content as the next
//! logical message. Downloads stream the peer's content into a `.part` file
//! that is only renamed into place once the declared size has arrived.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use washroom_core::{Result, WashroomError};
use washroom_protocol::{Channel, Directive, DownloadReply, Fragment, Inbound};

/// Suffix of a download that has not been verified yet
const PARTIAL_SUFFIX: &str = ".part";

fn file_error(path: &Path) -> impl Fn(std::io::Error) -> WashroomError + '_ {
    move |source| WashroomError::File {
        path: path.to_path_buf(),
        source,
    }
}

/// Upload a local file, returning the number of content bytes sent
pub async fn upload<T>(channel: &mut Channel<T>, path: &Path) -> Result<u64>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut file = File::open(path).await.map_err(file_error(path))?;
    let metadata = file.metadata().await.map_err(file_error(path))?;
    if !metadata.is_file() {
        return Err(WashroomError::invalid_command(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| WashroomError::invalid_command(format!("{} has no file name", path.display())))?;
    let size = metadata.len();

    upload_from(channel, &name, size, &mut file).await
}

/// Announce `size` bytes under `name` and stream them from `reader`.
///
/// A reader that ends early still terminates the message and is reported as
/// a `TransferMismatch`; the peer connection stays usable.
pub async fn upload_from<T, R>(channel: &mut Channel<T>, name: &str, size: u64, reader: &mut R) -> Result<u64>
where
    T: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    channel.send(Directive::Upload { name: name.to_string(), size }.encode()).await?;

    let mut buf = vec![0u8; channel.config().max_chunk_len];
    let mut sent = 0u64;
    let mut read_error = None;

    while sent < size {
        // Never read past the size already announced
        let want = (size - sent).min(buf.len() as u64) as usize;
        match reader.read(&mut buf[..want]).await {
            Ok(0) => break,
            Ok(n) => {
                channel
                    .send_fragment(Fragment::Data(Bytes::copy_from_slice(&buf[..n])))
                    .await?;
                sent += n as u64;
            }
            Err(e) => {
                read_error = Some(file_error(Path::new(name))(e));
                break;
            }
        }
    }

    // Terminate the message even on a short read so framing stays in sync
    channel.send_fragment(Fragment::End).await?;

    if let Some(err) = read_error {
        warn!(file = %name, sent, size, "Upload aborted by local read error");
        return Err(err);
    }
    if sent != size {
        warn!(file = %name, sent, size, "Upload short read");
        return Err(WashroomError::TransferMismatch {
            expected: size,
            actual: sent,
        });
    }

    info!(file = %name, size, "Upload complete");
    Ok(sent)
}

/// Download a remote file into `dir`, returning the final path and size
pub async fn download<T>(channel: &mut Channel<T>, name: &str, dir: &Path) -> Result<(PathBuf, u64)>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    // The local name comes from the operator's request, never from the peer
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| WashroomError::invalid_command(format!("{:?} has no file name", name)))?;
    let dest = dir.join(&base);
    let partial = dir.join(format!("{}{}", base, PARTIAL_SUFFIX));

    let reply = channel
        .request(Directive::Download { name: name.to_string() }.encode())
        .await?;
    let size = match DownloadReply::parse(&reply)? {
        DownloadReply::File { size, .. } => size,
        DownloadReply::Refused(reason) => return Err(WashroomError::Refused(reason)),
    };
    debug!(file = %name, size, "Download accepted");

    // One deadline for the whole content, scaled by the declared size
    let budget = channel.config().transfer_timeout(size);
    let deadline = Instant::now() + budget;

    // A local failure still drains the content so the channel stays usable
    let (mut sink, mut write_error) = match File::create(&partial).await {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(file_error(&partial)(e))),
    };
    let mut received = 0u64;

    loop {
        let frame = match channel.receive_frame_until(deadline, budget).await {
            Ok(frame) => frame,
            Err(err) => {
                discard(&partial).await;
                return Err(err);
            }
        };
        match frame {
            Inbound::Chunk(data) => {
                received += data.len() as u64;
                if received > size {
                    discard(&partial).await;
                    return Err(WashroomError::TransferOverrun { declared: size });
                }
                if let Some(file) = sink.as_mut() {
                    if let Err(e) = file.write_all(&data).await {
                        write_error = Some(file_error(&partial)(e));
                        sink = None;
                    }
                }
            }
            Inbound::End => break,
        }
    }

    if let Some(mut file) = sink.take() {
        if let Err(e) = file.flush().await {
            write_error = Some(file_error(&partial)(e));
        }
    }
    if let Some(err) = write_error {
        discard(&partial).await;
        return Err(err);
    }
    if received != size {
        discard(&partial).await;
        warn!(file = %name, received, size, "Download short");
        return Err(WashroomError::TransferMismatch {
            expected: size,
            actual: received,
        });
    }

    fs::rename(&partial, &dest).await.map_err(file_error(&dest))?;
    info!(file = %name, size, path = %dest.display(), "Download complete");
    Ok((dest, received))
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %e, "Could not remove partial download");
        }
    }
}
