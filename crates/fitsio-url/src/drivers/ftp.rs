//! The `ftp://`, `ftpfile://` and `ftpcompress://` drivers (feature
//! `network`): a minimal anonymous-login, passive-mode FTP client over
//! `std::net::TcpStream`, since no FTP crate appears anywhere in the
//! corpus this crate was grounded on and fabricating a dependency is not
//! an option. Retrieves the whole resource into memory on open, the same
//! way the `http://` family does (`spec.md` §4.D).

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

use flate2::read::GzDecoder;

use super::HandleTable;
use crate::driver::{Driver, DriverHandle, OpenMode};
use crate::error::{Error, Result};

struct Buffer {
    data: Vec<u8>,
    cursor: usize,
}

pub struct FtpDriver {
    prefix: &'static str,
    buffers: HandleTable<Buffer>,
}

impl FtpDriver {
    pub fn new(prefix: &'static str) -> Self {
        FtpDriver {
            prefix,
            buffers: HandleTable::default(),
        }
    }

    fn gunzip(&self) -> bool {
        self.prefix == "ftpcompress://"
    }
}

fn read_reply(reader: &mut BufReader<TcpStream>) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| Error::FileNotOpened(format!("ftp reply: {e}")))?;
    Ok(line)
}

fn send_command(stream: &mut TcpStream, cmd: &str) -> Result<()> {
    write!(stream, "{cmd}\r\n").map_err(|e| Error::FileNotOpened(format!("ftp command: {e}")))
}

/// Splits a `ftp://`-stripped URL of the form `host/path/to/file` into
/// `(host, path)`.
fn split_host_path(url: &str) -> (String, String) {
    match url.find('/') {
        Some(pos) => (url[..pos].to_string(), url[pos + 1..].to_string()),
        None => (url.to_string(), String::new()),
    }
}

/// Parses the host/port out of a `PASV` reply of the form
/// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).`
fn parse_pasv_reply(reply: &str) -> Result<(String, u16)> {
    let open = reply
        .find('(')
        .ok_or_else(|| Error::FileNotOpened("malformed PASV reply".to_string()))?;
    let close = reply
        .find(')')
        .ok_or_else(|| Error::FileNotOpened("malformed PASV reply".to_string()))?;
    let nums: Vec<u16> = reply[open + 1..close]
        .split(',')
        .map(|s| s.trim().parse().unwrap_or(0))
        .collect();
    if nums.len() != 6 {
        return Err(Error::FileNotOpened("malformed PASV reply".to_string()));
    }
    let host = format!("{}.{}.{}.{}", nums[0], nums[1], nums[2], nums[3]);
    let port = (nums[4] << 8) | nums[5];
    Ok((host, port))
}

fn retrieve(host_path: &str) -> Result<Vec<u8>> {
    let (host, path) = split_host_path(host_path);

    let control = TcpStream::connect((host.as_str(), 21))
        .map_err(|e| Error::FileNotOpened(format!("connecting to {host}: {e}")))?;
    let mut writer = control
        .try_clone()
        .map_err(|e| Error::FileNotOpened(format!("cloning control socket: {e}")))?;
    let mut reader = BufReader::new(control);

    read_reply(&mut reader)?; // greeting

    send_command(&mut writer, "USER anonymous")?;
    read_reply(&mut reader)?;
    send_command(&mut writer, "PASS anonymous@")?;
    read_reply(&mut reader)?;

    send_command(&mut writer, "TYPE I")?;
    read_reply(&mut reader)?;

    send_command(&mut writer, "PASV")?;
    let pasv_reply = read_reply(&mut reader)?;
    let (data_host, data_port) = parse_pasv_reply(&pasv_reply)?;

    let mut data_conn = TcpStream::connect((data_host.as_str(), data_port))
        .map_err(|e| Error::FileNotOpened(format!("connecting to data channel: {e}")))?;

    send_command(&mut writer, &format!("RETR {path}"))?;
    let reply = read_reply(&mut reader)?;
    if !reply.starts_with('1') {
        return Err(Error::FileNotOpened(format!("RETR {path} refused: {reply}")));
    }

    let mut data = Vec::new();
    data_conn
        .read_to_end(&mut data)
        .map_err(|e| Error::FileNotOpened(format!("reading data channel: {e}")))?;

    read_reply(&mut reader)?; // transfer complete
    send_command(&mut writer, "QUIT").ok();

    Ok(data)
}

impl Driver for FtpDriver {
    fn prefix(&self) -> &'static str {
        self.prefix
    }

    fn open(&self, url: &str, _mode: OpenMode) -> Result<DriverHandle> {
        let raw = retrieve(url)?;
        let data = if self.gunzip() {
            let mut decoder = GzDecoder::new(&raw[..]);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::FileNotOpened(format!("gzip decode failed: {e}")))?;
            out
        } else {
            raw
        };
        Ok(self.buffers.insert(Buffer { data, cursor: 0 }))
    }

    fn close(&self, handle: DriverHandle) -> Result<()> {
        self.buffers.remove(handle);
        Ok(())
    }

    fn size(&self, handle: DriverHandle) -> Result<u64> {
        self.buffers
            .with(handle, |b| b.data.len() as u64)
            .ok_or(Error::BadFilePtr)
    }

    fn seek(&self, handle: DriverHandle, offset: u64) -> Result<()> {
        self.buffers
            .with(handle, |b| b.cursor = offset as usize)
            .ok_or(Error::BadFilePtr)
    }

    fn read(&self, handle: DriverHandle, buf: &mut [u8]) -> Result<()> {
        self.buffers
            .with(handle, |b| {
                let end = b.cursor + buf.len();
                if end > b.data.len() {
                    return Err(Error::ReadError("read past end of FTP body".to_string()));
                }
                buf.copy_from_slice(&b.data[b.cursor..end]);
                b.cursor = end;
                Ok(())
            })
            .ok_or(Error::BadFilePtr)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_pasv_reply() {
        let (host, port) = parse_pasv_reply("227 Entering Passive Mode (192,168,1,5,200,10).").unwrap();
        assert_eq!(host, "192.168.1.5");
        assert_eq!(port, 200 * 256 + 10);
    }

    #[test]
    fn splits_host_and_path() {
        let (host, path) = split_host_path("ftp.example.org/pub/data.fits");
        assert_eq!(host, "ftp.example.org");
        assert_eq!(path, "pub/data.fits");
    }
}
