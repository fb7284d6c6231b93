//! Remote transport abstraction and the concrete FTP/FTPS implementation
//!
//! The uploader only needs chdir/mkdir/store, so that surface is a trait;
//! tests substitute a recording double. "Directory not found" is a typed
//! error kind here rather than a string match on the server reply.

use std::io::Read;
use suppaftp::native_tls::TlsConnector;
use suppaftp::{FtpError, FtpStream, NativeTlsConnector, NativeTlsFtpStream, Status};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("remote path not found: {path}")]
    NotFound { path: String },
    #[error("ftp: {0}")]
    Ftp(#[source] FtpError),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// The one error class the uploader recovers from (by mkdir)
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

/// Remote operations the uploader needs
pub trait Transport {
    /// Change into a remote directory; fails with `NotFound` when absent
    fn chdir(&mut self, dir: &str) -> Result<(), TransportError>;
    /// Create a remote directory
    fn mkdir(&mut self, dir: &str) -> Result<(), TransportError>;
    /// Stream `reader` to completion into the remote file `name`
    fn store(&mut self, name: &str, reader: &mut dyn Read) -> Result<u64, TransportError>;
    /// Close the session
    fn quit(&mut self) -> Result<(), TransportError>;
}

/// TLS behavior when dialing
#[derive(Debug, Clone, Copy)]
pub enum TlsMode {
    Off,
    On { accept_invalid_certs: bool },
}

/// FTP/FTPS transport over suppaftp
pub enum FtpTransport {
    Plain(FtpStream),
    Secure(NativeTlsFtpStream),
}

impl FtpTransport {
    pub fn connect(host: &str, port: u16, tls: TlsMode) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", host, port);
        match tls {
            TlsMode::Off => {
                let stream = FtpStream::connect(&addr).map_err(TransportError::Ftp)?;
                Ok(FtpTransport::Plain(stream))
            }
            TlsMode::On {
                accept_invalid_certs,
            } => {
                let connector = TlsConnector::builder()
                    .danger_accept_invalid_certs(accept_invalid_certs)
                    .build()
                    .map_err(|e| TransportError::Other(format!("TLS setup failed: {}", e)))?;
                let stream = NativeTlsFtpStream::connect(&addr)
                    .map_err(TransportError::Ftp)?
                    .into_secure(NativeTlsConnector::from(connector), host)
                    .map_err(TransportError::Ftp)?;
                Ok(FtpTransport::Secure(stream))
            }
        }
    }

    pub fn login(&mut self, user: &str, password: &str) -> Result<(), TransportError> {
        match self {
            FtpTransport::Plain(s) => s.login(user, password),
            FtpTransport::Secure(s) => s.login(user, password),
        }
        .map_err(TransportError::Ftp)
    }
}

/// Map a CWD failure: 550 means the directory is absent
fn classify_chdir(err: FtpError, dir: &str) -> TransportError {
    match err {
        FtpError::UnexpectedResponse(ref resp) if resp.status == Status::FileUnavailable => {
            TransportError::NotFound {
                path: dir.to_string(),
            }
        }
        other => TransportError::Ftp(other),
    }
}

impl Transport for FtpTransport {
    fn chdir(&mut self, dir: &str) -> Result<(), TransportError> {
        match self {
            FtpTransport::Plain(s) => s.cwd(dir),
            FtpTransport::Secure(s) => s.cwd(dir),
        }
        .map_err(|e| classify_chdir(e, dir))
    }

    fn mkdir(&mut self, dir: &str) -> Result<(), TransportError> {
        match self {
            FtpTransport::Plain(s) => s.mkdir(dir),
            FtpTransport::Secure(s) => s.mkdir(dir),
        }
        .map_err(TransportError::Ftp)
    }

    fn store(&mut self, name: &str, mut reader: &mut dyn Read) -> Result<u64, TransportError> {
        match self {
            FtpTransport::Plain(s) => s.put_file(name, &mut reader),
            FtpTransport::Secure(s) => s.put_file(name, &mut reader),
        }
        .map_err(TransportError::Ftp)
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        match self {
            FtpTransport::Plain(s) => s.quit(),
            FtpTransport::Secure(s) => s.quit(),
        }
        .map_err(TransportError::Ftp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suppaftp::types::Response;

    #[test]
    fn test_550_on_chdir_classifies_as_not_found() {
        let err = FtpError::UnexpectedResponse(Response::new(
            Status::FileUnavailable,
            "550 No such directory".as_bytes().to_vec(),
        ));
        let mapped = classify_chdir(err, "backups");
        assert!(mapped.is_not_found());
    }

    #[test]
    fn test_other_statuses_stay_fatal() {
        let err = FtpError::UnexpectedResponse(Response::new(
            Status::NotLoggedIn,
            "530 Not logged in".as_bytes().to_vec(),
        ));
        let mapped = classify_chdir(err, "backups");
        assert!(!mapped.is_not_found());
    }
}
